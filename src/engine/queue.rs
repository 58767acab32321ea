//! Per-lane priority queue.

use crate::request::Request;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// A request waiting in a lane, wrapped with ordering support.
///
/// Ordered by priority first (strictly-higher wins), then by submission
/// sequence so that equal-priority requests dequeue FIFO. The tie-break is
/// deliberate: with a bare heap, equal-priority work would dequeue in an
/// arbitrary order and could starve early submissions.
struct QueuedRequest {
    request: Arc<Request>,
    sequence: u64,
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedRequest {}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        let mine = self.request.priority();
        let theirs = other.request.priority();
        if mine.is_higher_than(&theirs) {
            Ordering::Greater
        } else if theirs.is_higher_than(&mine) {
            Ordering::Less
        } else {
            // Equal priority: earlier submission (lower sequence) first.
            other.sequence.cmp(&self.sequence)
        }
    }
}

/// Priority queue for one category lane.
///
/// Not thread-safe by itself; the engine wraps it in a mutex.
pub(crate) struct LaneQueue {
    heap: BinaryHeap<QueuedRequest>,
    next_sequence: u64,
}

impl LaneQueue {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Enqueues a request behind all strictly-higher-priority work and
    /// behind equal-priority work submitted earlier.
    pub fn push(&mut self, request: Arc<Request>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueuedRequest { request, sequence });
    }

    /// Pops the next live request, silently dropping any cancelled ones
    /// encountered on the way. Cancellation before dequeue gets no
    /// callback; the caller initiated it and already knows.
    pub fn pop_live(&mut self) -> Option<Arc<Request>> {
        while let Some(queued) = self.heap.pop() {
            if queued.request.is_cancelled() {
                tracing::debug!(
                    target = ?queued.request.target().map(url::Url::as_str),
                    "dropping cancelled request at dequeue"
                );
                continue;
            }
            return Some(queued.request);
        }
        None
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Category;
    use crate::failure::RequestFailure;
    use crate::priority::Priority;
    use crate::request::{RequestCallbacks, RequesterId, SuccessOutcome};

    struct SilentCallbacks;

    impl RequestCallbacks for SilentCallbacks {
        fn on_failure(&self, _failure: RequestFailure) {}
        fn on_success(&self, _outcome: SuccessOutcome) {}
    }

    fn request(path: &str, priority: Priority) -> Arc<Request> {
        Request::builder(
            Request::parse_target(&format!("https://example.com/{}", path)),
            RequesterId::anonymous(),
            Category::Immediate,
            Box::new(SilentCallbacks),
        )
        .priority(priority)
        .build()
    }

    fn popped_path(queue: &mut LaneQueue) -> String {
        queue
            .pop_live()
            .expect("queue should not be empty")
            .target()
            .unwrap()
            .path()
            .to_string()
    }

    #[test]
    fn test_higher_priority_pops_first() {
        let mut queue = LaneQueue::new();
        queue.push(request("low", Priority::new(10)));
        queue.push(request("high", Priority::new(0)));
        queue.push(request("mid", Priority::new(5)));

        assert_eq!(popped_path(&mut queue), "/high");
        assert_eq!(popped_path(&mut queue), "/mid");
        assert_eq!(popped_path(&mut queue), "/low");
    }

    #[test]
    fn test_equal_priority_is_fifo() {
        let mut queue = LaneQueue::new();
        queue.push(request("first", Priority::new(3)));
        queue.push(request("second", Priority::new(3)));
        queue.push(request("third", Priority::new(3)));

        assert_eq!(popped_path(&mut queue), "/first");
        assert_eq!(popped_path(&mut queue), "/second");
        assert_eq!(popped_path(&mut queue), "/third");
    }

    #[test]
    fn test_sub_rank_orders_within_rank() {
        let mut queue = LaneQueue::new();
        queue.push(request("b", Priority::with_sub_rank(1, 2)));
        queue.push(request("a", Priority::with_sub_rank(1, 1)));

        assert_eq!(popped_path(&mut queue), "/a");
        assert_eq!(popped_path(&mut queue), "/b");
    }

    #[test]
    fn test_cancelled_requests_are_dropped_silently() {
        let mut queue = LaneQueue::new();
        let doomed = request("doomed", Priority::new(0));
        queue.push(Arc::clone(&doomed));
        queue.push(request("survivor", Priority::new(5)));

        doomed.cancel();

        assert_eq!(popped_path(&mut queue), "/survivor");
        assert!(queue.pop_live().is_none());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let mut queue = LaneQueue::new();
        assert!(queue.is_empty());
        assert!(queue.pop_live().is_none());
    }

    #[test]
    fn test_len_counts_cancelled_until_popped() {
        let mut queue = LaneQueue::new();
        let r = request("x", Priority::new(0));
        queue.push(Arc::clone(&r));
        r.cancel();

        assert_eq!(queue.len(), 1);
        assert!(queue.pop_live().is_none());
        assert_eq!(queue.len(), 0);
    }
}
