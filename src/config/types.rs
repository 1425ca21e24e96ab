use crate::analyzer::{RuleEntry, RuleTable};
use serde::Deserialize;
use std::time::Duration;

/// Time allowed on top of the navigation timeout for starting the browser
pub const LAUNCH_ALLOWANCE_MS: u64 = 10_000;

/// Main configuration structure for Sumi-Atlas
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub enrichment: Option<EnrichmentConfig>,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
}

/// Headless browser settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FetcherConfig {
    /// Hard limit on one page load, launch to capture (milliseconds)
    pub navigation_timeout_ms: u64,

    /// How long the resource count must stay unchanged to count as idle
    pub network_idle_ms: u64,

    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,

    /// Overrides the browser's own user agent when set
    pub user_agent: Option<String>,
}

impl FetcherConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn network_idle(&self) -> Duration {
        Duration::from_millis(self.network_idle_ms)
    }

    /// Hard limit on a whole fetch, browser launch included
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms + LAUNCH_ALLOWANCE_MS)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            network_idle_ms: 500,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            user_agent: None,
        }
    }
}

/// Worker pool settings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkerConfig {
    /// Number of concurrent workers
    pub count: usize,

    /// How often idle workers check the queue without being woken (milliseconds)
    pub poll_interval_ms: u64,

    /// Age after which a running job is treated as abandoned by its worker
    /// and re-queued at start-up (milliseconds)
    pub job_lease_ms: u64,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_lease(&self) -> Duration {
        Duration::from_millis(self.job_lease_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 2,
            poll_interval_ms: 1_000,
            job_lease_ms: 600_000,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

/// Documentation and code generation service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnrichmentConfig {
    /// Base URL of the JSON endpoint
    pub endpoint: String,

    /// Sent as a bearer token when present
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_enrichment_timeout_ms")]
    pub timeout_ms: u64,
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_enrichment_timeout_ms() -> u64 {
    60_000
}

/// Analyzer settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzerConfig {
    /// Extra kinds, or replacements for built-in ones
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl AnalyzerConfig {
    /// The built-in rule table extended with the configured entries
    pub fn rule_table(&self) -> RuleTable {
        RuleTable::with_extra(&self.rules)
    }
}
