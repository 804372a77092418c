//! End-to-end construction behavior: partial failure isolation, tool
//! filtering, and idempotent teardown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use switchyard::config::RuntimeSettings;
use switchyard::context::RequestContext;
use switchyard::error::Result;
use switchyard::factory::{AgentFactory, SourceCleanup};
use switchyard::guardrails::GuardrailRegistry;
use switchyard::integration::{
    AgentDefinition, AgentIntegration, Integration, IntegrationCatalog, IntegrationKind,
    PassthroughCredentialResolver,
};
use switchyard::orchestrator::IntegrationOrchestrator;
use switchyard::tools::UniversalToolRegistry;
use switchyard::transport::{ServerConnection, ServerHandle, ServerToolSchema, ToolSource};

struct StaticCatalog {
    records: HashMap<String, Integration>,
}

#[async_trait]
impl IntegrationCatalog for StaticCatalog {
    async fn integration(&self, id: &str) -> Result<Option<Integration>> {
        Ok(self.records.get(id).cloned())
    }
}

struct CountingConnection {
    tools: Vec<ServerToolSchema>,
    close_calls: Arc<AtomicUsize>,
}

impl CountingConnection {
    fn with_tools(names: &[&str]) -> (Self, Arc<AtomicUsize>) {
        let close_calls = Arc::new(AtomicUsize::new(0));
        let tools = names
            .iter()
            .map(|name| ServerToolSchema {
                name: name.to_string(),
                description: Some(format!("{name} tool")),
                input_schema: json!({"type": "object", "properties": {}}),
            })
            .collect();
        (
            Self {
                tools,
                close_calls: Arc::clone(&close_calls),
            },
            close_calls,
        )
    }
}

#[async_trait]
impl ServerConnection for CountingConnection {
    async fn list_tools(&mut self) -> Result<Vec<ServerToolSchema>> {
        Ok(self.tools.clone())
    }

    async fn call_tool(
        &mut self,
        _name: &str,
        _arguments: serde_json::Value,
    ) -> Result<serde_json::Value> {
        Ok(json!({"ok": true}))
    }

    async fn close(&mut self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn hosted_integration(id: &str, name: &str) -> Integration {
    Integration {
        id: id.into(),
        kind: IntegrationKind::Hosted,
        name: name.into(),
        credentials: json!({
            "remoteUrl": format!("https://proxy.example.com/{name}"),
            "remoteLabel": name,
        }),
        is_active: true,
    }
}

fn stdio_integration(id: &str, name: &str, command: &str) -> Integration {
    Integration {
        id: id.into(),
        kind: IntegrationKind::Stdio,
        name: name.into(),
        credentials: json!({"command": command}),
        is_active: true,
    }
}

fn link(id: &str) -> AgentIntegration {
    AgentIntegration {
        integration_id: id.into(),
        is_enabled: true,
        selected_tools: Vec::new(),
        config: json!({}),
    }
}

fn definition(links: Vec<AgentIntegration>) -> AgentDefinition {
    AgentDefinition {
        id: "agent-1".into(),
        name: "support-bot".into(),
        instructions: "Help customers".into(),
        model: "gpt-4o".into(),
        is_active: true,
        rules: json!({}),
        selected_tools: Vec::new(),
        integrations: links,
    }
}

fn factory(records: Vec<Integration>) -> AgentFactory {
    let catalog = StaticCatalog {
        records: records
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect(),
    };
    AgentFactory::new(
        IntegrationOrchestrator::new(
            Arc::new(catalog),
            Arc::new(PassthroughCredentialResolver),
            Arc::new(RuntimeSettings::default()),
        ),
        GuardrailRegistry::new(),
        Arc::new(UniversalToolRegistry::empty()),
    )
}

fn ctx() -> RequestContext {
    RequestContext::new("org-1", "agent-1")
}

#[tokio::test]
async fn construction_yields_n_minus_f_sources() {
    // N = 4 integrations, F = 2 deliberately misconfigured.
    let factory = factory(vec![
        hosted_integration("int-1", "one"),
        hosted_integration("int-2", "two"),
        Integration {
            credentials: json!({"remoteLabel": "broken"}),
            ..hosted_integration("int-3", "three")
        },
        stdio_integration("int-4", "four", "/nonexistent/switchyard-test-server"),
    ]);

    let (agent, cleanup) = factory
        .create(
            &definition(vec![link("int-1"), link("int-2"), link("int-3"), link("int-4")]),
            &ctx(),
        )
        .await
        .expect("construction never fails solely because some integrations are broken");

    assert_eq!(agent.report.attempted, 4);
    assert_eq!(agent.report.succeeded, 2);
    assert_eq!(agent.report.failed, 2);
    assert_eq!(agent.hosted_tools.len(), 2);
    cleanup.close_all().await;
}

#[tokio::test]
async fn healthy_hosted_plus_broken_stdio_yields_exactly_one_source() {
    let factory = factory(vec![
        hosted_integration("int-1", "shop"),
        stdio_integration("int-2", "local", "/nonexistent/switchyard-test-server"),
    ]);

    let (agent, cleanup) = factory
        .create(&definition(vec![link("int-1"), link("int-2")]), &ctx())
        .await
        .unwrap();

    assert_eq!(agent.hosted_tools.len(), 1);
    assert_eq!(agent.report.succeeded, 1);
    assert_eq!(agent.report.failed, 1);
    cleanup.close_all().await;
}

#[tokio::test]
async fn stdio_selection_filter_is_enforced_client_side() {
    // A server exposing {a, b, c} behind a {a, b} selection.
    let (connection, _closes) = CountingConnection::with_tools(&["a", "b", "c"]);
    let filter = ["a".to_string(), "b".to_string()].into_iter().collect();
    let handle = ServerHandle::new("local", Box::new(connection), Some(filter));

    let tools = handle.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn closing_a_source_twice_is_a_benign_noop() {
    let (connection, closes) = CountingConnection::with_tools(&["a"]);
    let source = ToolSource::Server(ServerHandle::new("local", Box::new(connection), None));

    source.close().await.unwrap();
    source.close().await.unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(source.is_closed().await);
}

#[tokio::test]
async fn cleanup_handle_is_idempotent_across_sources() {
    let (first, first_closes) = CountingConnection::with_tools(&[]);
    let (second, second_closes) = CountingConnection::with_tools(&[]);
    let cleanup = SourceCleanup::new(vec![
        ToolSource::Server(ServerHandle::new("one", Box::new(first), None)),
        ToolSource::Server(ServerHandle::new("two", Box::new(second), None)),
    ]);

    cleanup.close_all().await;
    cleanup.close_all().await;

    assert_eq!(first_closes.load(Ordering::SeqCst), 1);
    assert_eq!(second_closes.load(Ordering::SeqCst), 1);
    assert!(cleanup.all_closed().await);
}
