//! Statistics generation from the atlas database
//!
//! This module provides functionality for extracting and displaying
//! archive, component and queue statistics from the storage layer.

use crate::state::{ArchiveStatus, ComponentType, JobState};
use crate::storage::Storage;
use crate::AtlasError;
use std::collections::HashMap;

/// Atlas statistics summary
#[derive(Debug, Clone, Default)]
pub struct AtlasStatistics {
    /// Total number of site archives
    pub total_archives: u64,

    /// Count of archives by status
    pub archives_by_status: HashMap<ArchiveStatus, u64>,

    /// Total number of stored components
    pub total_components: u64,

    /// Count of components by type
    pub components_by_type: HashMap<ComponentType, u64>,

    /// Count of crawl jobs by state
    pub jobs_by_state: HashMap<JobState, u64>,
}

impl AtlasStatistics {
    fn archives(&self, status: ArchiveStatus) -> u64 {
        self.archives_by_status.get(&status).copied().unwrap_or(0)
    }

    /// Share of finished crawls that completed, as a percentage
    ///
    /// None until at least one crawl has finished.
    pub fn success_rate(&self) -> Option<f64> {
        let completed = self.archives(ArchiveStatus::Completed);
        let finished = completed + self.archives(ArchiveStatus::Failed);
        if finished == 0 {
            None
        } else {
            Some(completed as f64 / finished as f64 * 100.0)
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(AtlasStatistics)` - Successfully loaded statistics
/// * `Err(AtlasError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> Result<AtlasStatistics, AtlasError> {
    let mut stats = AtlasStatistics::default();

    for status in ArchiveStatus::all() {
        let count = storage.count_archives_by_status(status)?;
        stats.total_archives += count;
        if count > 0 {
            stats.archives_by_status.insert(status, count);
        }
    }

    for component_type in ComponentType::all() {
        let count = storage.count_components_by_type(component_type)?;
        stats.total_components += count;
        if count > 0 {
            stats.components_by_type.insert(component_type, count);
        }
    }

    for state in JobState::all() {
        let count = storage.count_jobs_by_state(state)?;
        if count > 0 {
            stats.jobs_by_state.insert(state, count);
        }
    }

    Ok(stats)
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &AtlasStatistics) {
    println!("=== Atlas Statistics ===\n");

    println!("Archives: {}", stats.total_archives);
    for status in ArchiveStatus::all() {
        if let Some(count) = stats.archives_by_status.get(&status) {
            println!("  {}: {}", status, count);
        }
    }
    println!();

    println!("Components: {}", stats.total_components);
    let mut type_counts: Vec<_> = stats.components_by_type.iter().collect();
    type_counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_db_string().cmp(b.0.to_db_string())));
    for (component_type, count) in type_counts {
        println!("  {}: {}", component_type, count);
    }
    println!();

    if !stats.jobs_by_state.is_empty() {
        println!("Jobs:");
        for state in JobState::all() {
            if let Some(count) = stats.jobs_by_state.get(&state) {
                println!("  {}: {}", state, count);
            }
        }
        println!();
    }

    match stats.success_rate() {
        Some(rate) => println!(
            "Success Rate: {:.1}% ({} completed, {} failed)",
            rate,
            stats.archives(ArchiveStatus::Completed),
            stats.archives(ArchiveStatus::Failed)
        ),
        None => println!("Success Rate: n/a (no finished crawls)"),
    }
}
