//! Scheduling categories.

/// Independent scheduling lane for a request.
///
/// Each category has its own queue and its own concurrency ceiling, so
/// different remote services keep independent rate envelopes and bulk
/// work cannot crowd out interactive requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Requests against the primary remote API. Serialized by default so
    /// responses arrive in a predictable order.
    PrimaryApi,
    /// Requests against secondary remote APIs (media hosts, oEmbed
    /// endpoints).
    SecondaryApi,
    /// Interactive fetches the user is actively waiting on.
    Immediate,
    /// Background precache work.
    BulkPrecache,
}

impl Category {
    /// All categories, in lane-index order.
    pub const ALL: [Category; 4] = [
        Category::PrimaryApi,
        Category::SecondaryApi,
        Category::Immediate,
        Category::BulkPrecache,
    ];

    /// Number of categories.
    pub const COUNT: usize = Self::ALL.len();

    /// Stable lane index for array storage.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::PrimaryApi => 0,
            Self::SecondaryApi => 1,
            Self::Immediate => 2,
            Self::BulkPrecache => 3,
        }
    }

    /// Default concurrency ceiling for this lane.
    pub fn default_concurrency(self) -> usize {
        match self {
            Self::PrimaryApi => 1,
            Self::SecondaryApi => 2,
            Self::Immediate => 4,
            Self::BulkPrecache => 2,
        }
    }

    /// Short stable name for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrimaryApi => "primary_api",
            Self::SecondaryApi => "secondary_api",
            Self::Immediate => "immediate",
            Self::BulkPrecache => "bulk_precache",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
