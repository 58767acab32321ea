//! Engine configuration.

use super::category::Category;

/// Configuration for the queue engine.
///
/// # Example
///
/// ```
/// use fetchlane::engine::{Category, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_concurrency(Category::BulkPrecache, 1)
///     .with_concurrency(Category::Immediate, 8);
///
/// assert_eq!(config.concurrency(Category::Immediate), 8);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    concurrency: [usize; Category::COUNT],
}

impl EngineConfig {
    /// Sets the concurrency ceiling for one category. Clamped to at
    /// least 1; a lane with no workers would silently never drain.
    pub fn with_concurrency(mut self, category: Category, limit: usize) -> Self {
        self.concurrency[category.index()] = limit.max(1);
        self
    }

    /// Returns the concurrency ceiling for a category.
    pub fn concurrency(&self, category: Category) -> usize {
        self.concurrency[category.index()]
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut concurrency = [1; Category::COUNT];
        for category in Category::ALL {
            concurrency[category.index()] = category.default_concurrency();
        }
        Self { concurrency }
    }
}
