//! Integration orchestration: turn an agent's integration list into the
//! union of available tool sources, tolerating individual failures.

use std::sync::Arc;

use futures::future::join_all;

use crate::config::RuntimeSettings;
use crate::context::RequestContext;
use crate::error::SwitchyardError;
use crate::integration::{
    AgentDefinition, CredentialResolver, IntegrationCatalog, IntegrationDescriptor,
    IntegrationKind,
};
use crate::transport::{
    filter_effect, FilterEffect, HostedAdapter, HttpAdapter, StdioAdapter, ToolSource,
    TransportAdapter,
};

/// Per-integration note about what a configured tool filter actually does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterNote {
    pub integration: String,
    pub effect: FilterEffect,
}

/// Observability summary of one acquisition pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub notes: Vec<FilterNote>,
}

/// Tool sources acquired for one agent construction plus the report.
#[derive(Debug)]
pub struct AcquiredSources {
    pub sources: Vec<ToolSource>,
    pub report: AcquisitionReport,
}

enum Outcome {
    Skipped,
    Succeeded(ToolSource, Option<FilterNote>),
    Failed,
}

/// Builds every enabled integration's tool source, isolating failures so a
/// single malformed or unreachable integration never prevents construction
/// with the remaining healthy ones.
pub struct IntegrationOrchestrator {
    catalog: Arc<dyn IntegrationCatalog>,
    credentials: Arc<dyn CredentialResolver>,
    hosted: HostedAdapter,
    http: HttpAdapter,
    stdio: StdioAdapter,
}

impl IntegrationOrchestrator {
    pub fn new(
        catalog: Arc<dyn IntegrationCatalog>,
        credentials: Arc<dyn CredentialResolver>,
        settings: Arc<RuntimeSettings>,
    ) -> Self {
        Self {
            catalog,
            credentials,
            hosted: HostedAdapter::new(Arc::clone(&settings)),
            http: HttpAdapter::new(Arc::clone(&settings)),
            stdio: StdioAdapter::new(settings),
        }
    }

    /// Acquire tool sources for every enabled integration of `definition`.
    ///
    /// Construction is issued per integration independently, so one slow or
    /// hanging integration never blocks the others' attempts. Integration-
    /// local errors are logged and absorbed; this method itself never fails.
    pub async fn acquire(
        &self,
        definition: &AgentDefinition,
        ctx: &RequestContext,
    ) -> AcquiredSources {
        let constructions = definition
            .integrations
            .iter()
            .map(|link| self.construct_one(link, ctx));
        let outcomes = join_all(constructions).await;

        let mut report = AcquisitionReport::default();
        let mut sources = Vec::new();
        for outcome in outcomes {
            match outcome {
                Outcome::Skipped => {}
                Outcome::Succeeded(source, note) => {
                    report.attempted += 1;
                    report.succeeded += 1;
                    if let Some(note) = note {
                        report.notes.push(note);
                    }
                    sources.push(source);
                }
                Outcome::Failed => {
                    report.attempted += 1;
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            organization = %ctx.organization_id,
            agent = %ctx.agent_id,
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Acquired integration tool sources"
        );
        AcquiredSources { sources, report }
    }

    async fn construct_one(
        &self,
        link: &crate::integration::AgentIntegration,
        ctx: &RequestContext,
    ) -> Outcome {
        if !link.is_enabled {
            tracing::debug!(integration_id = %link.integration_id, "Integration disabled, skipping");
            return Outcome::Skipped;
        }

        let integration = match self.catalog.integration(&link.integration_id).await {
            Ok(Some(integration)) => integration,
            Ok(None) => {
                tracing::warn!(
                    integration_id = %link.integration_id,
                    "Integration record not found"
                );
                return Outcome::Failed;
            }
            Err(error) => {
                tracing::warn!(
                    integration_id = %link.integration_id,
                    error = %error,
                    "Integration lookup failed"
                );
                return Outcome::Failed;
            }
        };

        if !integration.is_active {
            tracing::debug!(integration = %integration.name, "Integration inactive, skipping");
            return Outcome::Skipped;
        }
        if integration.kind == IntegrationKind::VendorBuiltin {
            // Vendor tool handlers are resolved by collaborators, not here.
            tracing::debug!(integration = %integration.name, "Vendor-builtin integration, skipping");
            return Outcome::Skipped;
        }

        let mut descriptor = IntegrationDescriptor::from_records(&integration, link);
        if self.credentials.is_encrypted(&descriptor.credentials) {
            descriptor.credentials = match self.credentials.decrypt(&descriptor.credentials).await
            {
                Ok(plaintext) => plaintext,
                Err(error) => {
                    let error = SwitchyardError::CredentialDecryption {
                        integration: integration.name.clone(),
                        message: error.to_string(),
                    };
                    tracing::warn!(integration = %integration.name, error = %error, "Skipping integration");
                    return Outcome::Failed;
                }
            };
        }

        let note = filter_effect(&descriptor).map(|effect| {
            if effect == FilterEffect::NoEffect {
                tracing::warn!(
                    integration = %descriptor.name,
                    "Tool selection configured for a hosted integration has no runtime effect"
                );
            }
            FilterNote {
                integration: descriptor.name.clone(),
                effect,
            }
        });

        let created = match descriptor.kind {
            IntegrationKind::Hosted => self.hosted.create(&descriptor, ctx).await,
            IntegrationKind::Http => self.http.create(&descriptor, ctx).await,
            IntegrationKind::Stdio => self.stdio.create(&descriptor, ctx).await,
            IntegrationKind::VendorBuiltin => unreachable!("skipped above"),
        };

        match created {
            Ok(source) => Outcome::Succeeded(source, note),
            Err(error) => {
                tracing::warn!(
                    integration = %descriptor.name,
                    kind = %descriptor.kind,
                    error = %error,
                    "Integration construction failed"
                );
                Outcome::Failed
            }
        }
    }
}

/// Close every source concurrently, best-effort.
///
/// Close failures are collected and logged, never propagated: one failed
/// close must not block the others, and teardown must not cascade into a
/// request failure.
pub async fn close_sources(sources: &[ToolSource]) {
    let closes = sources.iter().map(|source| async move {
        if let Err(error) = source.close().await {
            tracing::warn!(
                integration = %source.integration(),
                error = %error,
                "Tool source close failed"
            );
        }
    });
    join_all(closes).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{
        AgentIntegration, Integration, PassthroughCredentialResolver,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;

    struct StaticCatalog {
        records: HashMap<String, Integration>,
    }

    #[async_trait]
    impl IntegrationCatalog for StaticCatalog {
        async fn integration(&self, id: &str) -> crate::error::Result<Option<Integration>> {
            Ok(self.records.get(id).cloned())
        }
    }

    struct RefusingResolver;

    #[async_trait]
    impl CredentialResolver for RefusingResolver {
        fn is_encrypted(&self, _credentials: &serde_json::Value) -> bool {
            true
        }

        async fn decrypt(
            &self,
            _credentials: &serde_json::Value,
        ) -> crate::error::Result<serde_json::Value> {
            Err(SwitchyardError::Configuration("bad ciphertext".into()))
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

    fn orchestrator(records: Vec<Integration>) -> IntegrationOrchestrator {
        let catalog = StaticCatalog {
            records: records
                .into_iter()
                .map(|record| (record.id.clone(), record))
                .collect(),
        };
        IntegrationOrchestrator::new(
            Arc::new(catalog),
            Arc::new(PassthroughCredentialResolver),
            Arc::new(RuntimeSettings::default()),
        )
    }

    fn ctx() -> RequestContext {
        RequestContext::new("org-1", "agent-1")
    }

    #[tokio::test]
    async fn misconfigured_integrations_never_block_healthy_ones() {
        // One healthy hosted integration, one stdio integration pointing at a
        // command that does not exist.
        let orchestrator = orchestrator(vec![
            hosted_integration("int-1", "shop"),
            stdio_integration("int-2", "local", "/nonexistent/switchyard-test-server"),
        ]);

        let acquired = orchestrator
            .acquire(&definition(vec![link("int-1"), link("int-2")]), &ctx())
            .await;

        assert_eq!(acquired.sources.len(), 1);
        assert_eq!(acquired.report.attempted, 2);
        assert_eq!(acquired.report.succeeded, 1);
        assert_eq!(acquired.report.failed, 1);
    }

    #[tokio::test]
    async fn n_minus_f_sources_for_f_misconfigured() {
        let orchestrator = orchestrator(vec![
            hosted_integration("int-1", "one"),
            hosted_integration("int-2", "two"),
            Integration {
                // Missing remoteUrl: fails in the adapter, not the aggregate.
                credentials: json!({"remoteLabel": "broken"}),
                ..hosted_integration("int-3", "three")
            },
            stdio_integration("int-4", "four", "$(rm -rf /)"),
        ]);

        let acquired = orchestrator
            .acquire(
                &definition(vec![link("int-1"), link("int-2"), link("int-3"), link("int-4")]),
                &ctx(),
            )
            .await;

        assert_eq!(acquired.report.attempted, 4);
        assert_eq!(acquired.report.failed, 2);
        assert_eq!(acquired.sources.len(), 2);
    }

    #[tokio::test]
    async fn disabled_and_inactive_integrations_are_skipped_not_failed() {
        let mut inactive = hosted_integration("int-2", "dormant");
        inactive.is_active = false;

        let orchestrator = orchestrator(vec![hosted_integration("int-1", "shop"), inactive]);

        let mut disabled_link = link("int-1");
        disabled_link.is_enabled = false;

        let acquired = orchestrator
            .acquire(&definition(vec![disabled_link, link("int-2")]), &ctx())
            .await;

        assert_eq!(acquired.report.attempted, 0);
        assert_eq!(acquired.report.failed, 0);
        assert!(acquired.sources.is_empty());
    }

    #[tokio::test]
    async fn decrypt_failure_skips_only_that_integration() {
        let catalog = StaticCatalog {
            records: [
                ("int-1".to_string(), hosted_integration("int-1", "one")),
                ("int-2".to_string(), hosted_integration("int-2", "two")),
            ]
            .into_iter()
            .collect(),
        };
        let orchestrator = IntegrationOrchestrator::new(
            Arc::new(catalog),
            Arc::new(RefusingResolver),
            Arc::new(RuntimeSettings::default()),
        );

        let acquired = orchestrator
            .acquire(&definition(vec![link("int-1"), link("int-2")]), &ctx())
            .await;

        // Every integration decrypts through the refusing resolver and fails,
        // but acquisition itself still completes.
        assert_eq!(acquired.report.attempted, 2);
        assert_eq!(acquired.report.failed, 2);
        assert!(acquired.sources.is_empty());
    }

    #[tokio::test]
    async fn hosted_selection_filter_is_surfaced_as_no_effect() {
        let orchestrator = orchestrator(vec![hosted_integration("int-1", "shop")]);
        let mut filtered_link = link("int-1");
        filtered_link.selected_tools = vec!["lookup".into()];

        let acquired = orchestrator
            .acquire(&definition(vec![filtered_link]), &ctx())
            .await;

        assert_eq!(
            acquired.report.notes,
            vec![FilterNote {
                integration: "shop".into(),
                effect: FilterEffect::NoEffect,
            }]
        );
    }

    #[tokio::test]
    async fn missing_backing_record_counts_as_failure() {
        let orchestrator = orchestrator(vec![]);
        let acquired = orchestrator
            .acquire(&definition(vec![link("ghost")]), &ctx())
            .await;

        assert_eq!(acquired.report.attempted, 1);
        assert_eq!(acquired.report.failed, 1);
    }

    #[tokio::test]
    async fn close_sources_tolerates_failing_closes() {
        use crate::transport::server::test_support::MockConnection;
        use crate::transport::ServerHandle;
        use std::sync::atomic::Ordering;

        let (mut failing, failing_closes) = MockConnection::with_tools(&[]);
        failing.fail_close = true;
        let (healthy, healthy_closes) = MockConnection::with_tools(&[]);

        let sources = vec![
            ToolSource::Server(ServerHandle::new("bad", Box::new(failing), None)),
            ToolSource::Server(ServerHandle::new("good", Box::new(healthy), None)),
        ];

        close_sources(&sources).await;

        assert_eq!(failing_closes.load(Ordering::SeqCst), 1);
        assert_eq!(healthy_closes.load(Ordering::SeqCst), 1);
        for source in &sources {
            assert!(source.is_closed().await);
        }
    }
}
