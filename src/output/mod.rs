//! Output module for reporting on the atlas
//!
//! This module handles:
//! - Archive, component and job statistics
//! - Plain-text listings of archives, components and explanations

mod listing;
pub mod stats;

pub use listing::{print_archives, print_components, print_explanation};
pub use stats::{load_statistics, print_statistics, AtlasStatistics};
