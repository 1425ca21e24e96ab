/// Archive status definitions for tracking crawl progress
///
/// A site archive moves `Pending -> Processing -> {Completed, Failed}`. A new
/// ingest of the same root URL forces it back to `Pending` from any state.
use std::fmt;

/// Represents the current crawl status of a site archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveStatus {
    /// A crawl job has been enqueued but no worker has picked it up
    Pending,

    /// A worker is fetching and analyzing the root page
    Processing,

    /// The last crawl finished and its components are stored
    Completed,

    /// The last crawl failed; a new ingest retries it
    Failed,
}

impl ArchiveStatus {
    /// Returns true if this is a terminal state (no worker will touch it again
    /// until the next ingest)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if a crawl job is outstanding for the archive
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Checks whether a transition is part of the archive lifecycle
    ///
    /// Any state may go back to `Pending` (manual re-crawl). Workers drive
    /// `Pending -> Processing` and `Processing -> {Completed, Failed}`. Since
    /// concurrent jobs on one archive race, a worker may also observe
    /// `Processing -> Processing`.
    pub fn can_transition_to(&self, next: ArchiveStatus) -> bool {
        match (self, next) {
            (_, Self::Pending) => true,
            (Self::Pending | Self::Processing, Self::Processing) => true,
            (Self::Processing, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parses a status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "PROCESSING" => Some(Self::Processing),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all archive statuses
    pub fn all() -> [Self; 4] {
        [
            Self::Pending,
            Self::Processing,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for ArchiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
