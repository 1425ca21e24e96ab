//! JSON-over-HTTP enrichment client

use crate::config::EnrichmentConfig;
use crate::enrichment::{EnrichmentError, EnrichmentGateway, GeneratedDocs};
use crate::state::ComponentType;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use url::Url;

const DOCS_PATH: &str = "docs";
const TRANSFORM_PATH: &str = "transform";

/// Framework requested from the transform endpoint
const TARGET_FRAMEWORK: &str = "react";

#[derive(Debug, Deserialize)]
struct TransformResponse {
    code: String,
}

/// Calls an enrichment service exposing `POST {endpoint}/docs` and
/// `POST {endpoint}/transform`
pub struct HttpEnrichmentGateway {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpEnrichmentGateway {
    pub fn new(config: &EnrichmentConfig) -> Result<Self, EnrichmentError> {
        let mut endpoint = Url::parse(&config.endpoint)
            .map_err(|e| EnrichmentError::InvalidResponse(format!("bad endpoint: {}", e)))?;

        // Keep the last path segment when joining relative routes
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("sumi-atlas/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        route: &str,
        body: serde_json::Value,
    ) -> Result<T, EnrichmentError> {
        let url = self
            .endpoint
            .join(route)
            .map_err(|e| EnrichmentError::InvalidResponse(format!("bad route {}: {}", route, e)))?;

        debug!("POST {}", url);
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EnrichmentError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| EnrichmentError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl EnrichmentGateway for HttpEnrichmentGateway {
    async fn generate_docs(
        &self,
        html: &str,
        component_type: ComponentType,
        css: &str,
    ) -> Result<GeneratedDocs, EnrichmentError> {
        let body = serde_json::json!({
            "html": html,
            "component_type": component_type.to_db_string(),
            "css": css,
        });
        self.post(DOCS_PATH, body).await
    }

    async fn transform_to_framework(
        &self,
        html: &str,
        component_type: ComponentType,
    ) -> Result<String, EnrichmentError> {
        let body = serde_json::json!({
            "html": html,
            "component_type": component_type.to_db_string(),
            "framework": TARGET_FRAMEWORK,
        });
        let response: TransformResponse = self.post(TRANSFORM_PATH, body).await?;

        if response.code.trim().is_empty() {
            return Err(EnrichmentError::InvalidResponse(
                "transform returned no code".to_string(),
            ));
        }
        Ok(response.code)
    }
}
