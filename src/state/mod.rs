//! State module for tracking crawl progress
//!
//! This module defines the enumerations persisted alongside crawl entities.
//!
//! # Components
//!
//! - `ArchiveStatus`: Lifecycle of a site archive (pending, processing, completed, failed)
//! - `JobState`: Lifecycle of a queued crawl job
//! - `ComponentType`: The persisted classification of an extracted component

mod archive_status;
mod component_type;
mod job_state;

// Re-export main types
pub use archive_status::ArchiveStatus;
pub use component_type::ComponentType;
pub use job_state::JobState;
