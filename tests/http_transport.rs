//! HTTP transport behavior against a stub endpoint.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchyard::config::RuntimeSettings;
use switchyard::context::RequestContext;
use switchyard::integration::{IntegrationDescriptor, IntegrationKind};
use switchyard::transport::{HttpAdapter, TransportAdapter};

fn descriptor(endpoint: &str, selected: &[&str]) -> IntegrationDescriptor {
    IntegrationDescriptor {
        kind: IntegrationKind::Http,
        name: "crm".into(),
        credentials: json!({
            "endpointUrl": endpoint,
            "auth": {"type": "bearer", "token": "token-123"},
        }),
        selected_tools: selected
            .iter()
            .map(|s| s.to_string())
            .collect::<BTreeSet<_>>(),
        enabled: true,
    }
}

fn ctx() -> RequestContext {
    RequestContext::new("org-1", "agent-1")
}

#[tokio::test]
async fn connect_failure_is_surfaced_not_hung() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = HttpAdapter::new(Arc::new(RuntimeSettings::default()));
    let result = tokio::time::timeout(
        Duration::from_secs(30),
        adapter.create(&descriptor(&format!("{}/mcp", server.uri()), &[]), &ctx()),
    )
    .await
    .expect("connect against a failing endpoint must resolve");

    assert!(result.is_err());
}

#[tokio::test]
async fn auth_and_selection_headers_reach_the_endpoint() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = HttpAdapter::new(Arc::new(RuntimeSettings::default()));
    let _ = tokio::time::timeout(
        Duration::from_secs(30),
        adapter.create(
            &descriptor(&format!("{}/mcp", server.uri()), &["lookup", "update"]),
            &ctx(),
        ),
    )
    .await
    .expect("connect against a failing endpoint must resolve");

    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert!(!requests.is_empty(), "the adapter should have attempted to connect");

    let request = &requests[0];
    let header = |name: &str| {
        request
            .headers
            .get(name)
            .unwrap_or_else(|| panic!("{name} header present"))
            .to_str()
            .expect("header value is ascii")
            .to_owned()
    };
    assert_eq!(header("authorization"), "Bearer token-123");
    assert_eq!(header("x-mcp-selected-tools"), r#"["lookup","update"]"#);
}
