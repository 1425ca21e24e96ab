//! Integration tests for the crawl pipeline and enrichment client

mod common;
mod enrichment_tests;
mod pipeline_tests;
