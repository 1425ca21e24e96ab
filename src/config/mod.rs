//! Configuration module for Sumi-Atlas
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_atlas::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("atlas.toml")).unwrap();
//! println!("Running {} workers", config.worker.count);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    AnalyzerConfig, Config, EnrichmentConfig, FetcherConfig, OutputConfig, WorkerConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
