//! Enrichment client tests against a mock HTTP service

use crate::common::memory_queue;
use serde_json::json;
use sumi_atlas::config::EnrichmentConfig;
use sumi_atlas::enrichment::{convert_component, explain_component, HttpEnrichmentGateway};
use sumi_atlas::queue::CrawlQueue;
use sumi_atlas::storage::{NewComponent, Storage};
use sumi_atlas::{AtlasError, ComponentType};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway_for(server: &MockServer, api_key: Option<&str>) -> HttpEnrichmentGateway {
    HttpEnrichmentGateway::new(&EnrichmentConfig {
        endpoint: format!("{}/api", server.uri()),
        api_key: api_key.map(str::to_string),
        timeout_ms: 5_000,
    })
    .unwrap()
}

/// Stores one nav component and returns its ID
fn seed_component(queue: &CrawlQueue) -> i64 {
    let mut storage = queue.storage();
    let archive = storage
        .upsert_archive("https://acme.example/", "acme.example")
        .unwrap();
    let snapshot = storage
        .create_snapshot(
            archive,
            "https://acme.example/",
            "Acme",
            "@import url(\"https://acme.example/site.css\");",
        )
        .unwrap();
    storage
        .create_component(
            snapshot,
            &NewComponent {
                name: "NAV - nav0".to_string(),
                component_type: ComponentType::Nav,
                selector: "nav0".to_string(),
                html_snippet: r#"<nav class="navbar"><a>Home</a></nav>"#.to_string(),
                complexity_score: 15,
                tags: vec!["nav".to_string()],
                is_react: false,
                is_tailwind: false,
            },
        )
        .unwrap()
        .id()
}

#[tokio::test]
async fn test_explain_stores_docs_and_tags() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/docs"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "Top navigation bar",
            "technical_notes": "Flex row of links",
            "markdown_content": "# Navbar",
            "complexity_rating": "low",
            "suggested_tags": ["Navigation", "nav", " flex "]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let queue = memory_queue();
    let id = seed_component(&queue);
    let gateway = gateway_for(&server, Some("secret"));

    let explanation = explain_component(&queue, &gateway, id).await.unwrap();
    assert_eq!(explanation.component_id, id);
    assert_eq!(explanation.summary, "Top navigation bar");
    assert_eq!(explanation.tags, vec!["nav", "navigation", "flex"]);

    let component = queue.storage().get_component(id).unwrap();
    assert_eq!(component.tags, vec!["flex", "nav", "navigation"]);
}

#[tokio::test]
async fn test_explain_replaces_previous_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "summary": "Second pass",
            "technical_notes": "",
            "markdown_content": "",
            "complexity_rating": "medium"
        })))
        .mount(&server)
        .await;

    let queue = memory_queue();
    let id = seed_component(&queue);
    let gateway = gateway_for(&server, None);

    explain_component(&queue, &gateway, id).await.unwrap();
    explain_component(&queue, &gateway, id).await.unwrap();

    let stored = queue.storage().get_explanation(id).unwrap().unwrap();
    assert_eq!(stored.summary, "Second pass");
    assert_eq!(stored.complexity_rating, "medium");
    assert_eq!(stored.tags, vec!["nav"]);
}

#[tokio::test]
async fn test_convert_stores_react_code() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transform"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "export function Navbar() { return <nav />; }"
        })))
        .mount(&server)
        .await;

    let queue = memory_queue();
    let id = seed_component(&queue);
    let gateway = gateway_for(&server, None);

    let code = convert_component(&queue, &gateway, id).await.unwrap();
    assert!(code.contains("Navbar"));

    let component = queue.storage().get_component(id).unwrap();
    assert_eq!(component.react_code.as_deref(), Some(code.as_str()));
}

#[tokio::test]
async fn test_service_error_leaves_component_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let queue = memory_queue();
    let id = seed_component(&queue);
    let gateway = gateway_for(&server, None);

    let err = explain_component(&queue, &gateway, id).await.unwrap_err();
    assert!(matches!(err, AtlasError::Enrichment(_)));
    assert!(err.to_string().contains("503"));

    assert!(convert_component(&queue, &gateway, id).await.is_err());

    let storage = queue.storage();
    assert!(storage.get_explanation(id).unwrap().is_none());
    let component = storage.get_component(id).unwrap();
    assert!(component.react_code.is_none());
    assert_eq!(component.tags, vec!["nav"]);
}

#[tokio::test]
async fn test_unknown_component_is_not_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let queue = memory_queue();
    let gateway = gateway_for(&server, None);

    let err = explain_component(&queue, &gateway, 999).await.unwrap_err();
    assert!(matches!(err, AtlasError::StorageError(_)));
}
