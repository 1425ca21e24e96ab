//! Component enrichment
//!
//! Enrichment asks an external service to document a stored component or to
//! rewrite it as framework code. It runs only on request, never inside a
//! crawl, and its failures are reported to the caller without touching any
//! archive or job state.

mod http;

pub use http::HttpEnrichmentGateway;

use crate::queue::CrawlQueue;
use crate::state::ComponentType;
use crate::storage::{ComponentRecord, ExplanationRecord, NewExplanation, Storage, StorageError};
use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors from the enrichment service
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Enrichment service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response from enrichment service: {0}")]
    InvalidResponse(String),

    #[error("Enrichment is not configured")]
    NotConfigured,
}

/// Documentation generated for a component
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedDocs {
    pub summary: String,
    pub technical_notes: String,
    pub markdown_content: String,
    pub complexity_rating: String,
    #[serde(default)]
    pub suggested_tags: Vec<String>,
}

/// External documentation and code generation service
#[async_trait]
pub trait EnrichmentGateway: Send + Sync {
    /// Writes documentation for a component snippet
    async fn generate_docs(
        &self,
        html: &str,
        component_type: ComponentType,
        css: &str,
    ) -> Result<GeneratedDocs, EnrichmentError>;

    /// Rewrites a component snippet as framework (React) code
    async fn transform_to_framework(
        &self,
        html: &str,
        component_type: ComponentType,
    ) -> Result<String, EnrichmentError>;
}

/// Documents a stored component and records the result
///
/// The explanation replaces any earlier one. Its tags are the component type's
/// tag followed by the service's suggestions, lower-cased and deduplicated;
/// the same tags are added to the component.
///
/// # Arguments
///
/// * `queue` - The store holding the component
/// * `gateway` - The enrichment service
/// * `component_id` - The component to document
///
/// # Returns
///
/// * `Ok(ExplanationRecord)` - The stored explanation
/// * `Err(AtlasError)` - The component is unknown or the service failed
pub async fn explain_component(
    queue: &CrawlQueue,
    gateway: &dyn EnrichmentGateway,
    component_id: i64,
) -> crate::Result<ExplanationRecord> {
    let (component, css) = {
        let storage = queue.storage();
        let component = storage.get_component(component_id)?;
        let css = storage.get_snapshot(component.page_snapshot_id)?.captured_css;
        (component, css)
    };

    let docs = gateway
        .generate_docs(&component.html_snippet, component.component_type, &css)
        .await?;

    let tags = merge_tags(baseline_tag(&component), &docs.suggested_tags);
    let explanation = NewExplanation {
        summary: docs.summary,
        technical_notes: docs.technical_notes,
        markdown_content: docs.markdown_content,
        complexity_rating: docs.complexity_rating,
        tags: tags.clone(),
    };

    let mut storage = queue.storage();
    storage.upsert_explanation(component_id, &explanation)?;
    storage.add_component_tags(component_id, &tags)?;
    let record = storage
        .get_explanation(component_id)?
        .ok_or(StorageError::ComponentNotFound(component_id))?;

    info!("Stored explanation for component {}", component_id);
    Ok(record)
}

/// Generates framework code for a stored component and saves it
pub async fn convert_component(
    queue: &CrawlQueue,
    gateway: &dyn EnrichmentGateway,
    component_id: i64,
) -> crate::Result<String> {
    let component = queue.storage().get_component(component_id)?;

    let code = gateway
        .transform_to_framework(&component.html_snippet, component.component_type)
        .await?;

    queue.storage().set_react_code(component_id, &code)?;
    info!("Stored framework code for component {}", component_id);
    Ok(code)
}

/// Label tag the component was stored with
///
/// Custom kinds are stored as `UNKNOWN` but keep their own label as the
/// prefix of the display name, so that label is used instead.
fn baseline_tag(component: &ComponentRecord) -> String {
    if component.component_type != ComponentType::Unknown {
        return component.component_type.tag();
    }
    component
        .name
        .split(" - ")
        .next()
        .map(|kind| kind.trim().to_lowercase())
        .filter(|kind| !kind.is_empty())
        .unwrap_or_else(|| ComponentType::Unknown.tag())
}

/// Baseline tag first, then suggestions in order, without repeats
fn merge_tags(baseline: String, suggested: &[String]) -> Vec<String> {
    let mut tags = vec![baseline];
    for tag in suggested {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}
