//! URL handling module for Sumi-Atlas
//!
//! This module provides root URL normalization for archive identity, domain
//! extraction, and resolution of relative references inside extracted
//! fragments.

mod domain;
mod normalize;
mod resolve;

// Re-export main functions
pub use domain::extract_domain;
pub use normalize::normalize_url;
pub use resolve::{absolutize, is_absolute_or_data};
