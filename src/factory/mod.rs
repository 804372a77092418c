//! Agent factory: the only path producing a runnable agent.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::context::RequestContext;
use crate::error::{Result, SwitchyardError};
use crate::guardrails::{GuardrailPipeline, GuardrailRegistry};
use crate::integration::{AgentDefinition, GuardrailSpec};
use crate::orchestrator::{close_sources, AcquisitionReport, IntegrationOrchestrator};
use crate::tools::{ServerTool, Tool, UniversalToolRegistry};
use crate::transport::{HostedToolReference, ToolSource};

/// Source of agent definitions, provided by the platform.
#[async_trait]
pub trait AgentDefinitionSource: Send + Sync {
    async fn definition(&self, agent_id: &str) -> Result<Option<AgentDefinition>>;
}

/// Keys the factory computes itself; stored configuration must not be able
/// to override them through the free-form rules document.
const RESERVED_OVERRIDE_KEYS: &[&str] = &[
    "tools",
    "guardrails",
    "inputGuardrails",
    "outputGuardrails",
    "input_guardrails",
    "output_guardrails",
];

/// Handle that releases every tool source opened for one agent.
///
/// Cloneable; `close_all` is idempotent and never propagates close failures.
#[derive(Clone)]
pub struct SourceCleanup {
    sources: Arc<Mutex<Vec<ToolSource>>>,
}

impl SourceCleanup {
    pub fn new(sources: Vec<ToolSource>) -> Self {
        Self {
            sources: Arc::new(Mutex::new(sources)),
        }
    }

    /// Close every source concurrently. Safe to call more than once: each
    /// handle's close is idempotent, so repeat calls are no-ops.
    pub async fn close_all(&self) {
        let guard = self.sources.lock().await;
        close_sources(&guard).await;
    }

    /// Whether every held source has reached closed state.
    pub async fn all_closed(&self) -> bool {
        let guard = self.sources.lock().await;
        for source in guard.iter() {
            if !source.is_closed().await {
                return false;
            }
        }
        true
    }
}

impl std::fmt::Debug for SourceCleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCleanup").finish()
    }
}

/// A fully composed, runnable agent. Immutable once built; corresponds to
/// one session's live runtime.
pub struct AssembledAgent {
    pub instructions: String,
    pub model: String,
    pub tools: Vec<Arc<dyn Tool>>,
    pub hosted_tools: Vec<HostedToolReference>,
    pub input_guardrails: GuardrailPipeline,
    pub output_guardrails: GuardrailPipeline,
    /// Free-form configuration overrides with factory-reserved keys stripped.
    pub overrides: serde_json::Map<String, serde_json::Value>,
    /// Acquisition summary for observability.
    pub report: AcquisitionReport,
}

impl std::fmt::Debug for AssembledAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssembledAgent")
            .field("model", &self.model)
            .field("tools", &self.tools.len())
            .field("hosted_tools", &self.hosted_tools.len())
            .field("report", &self.report)
            .finish()
    }
}

/// Composes instructions, model, tools, and guardrails into an
/// [`AssembledAgent`] plus the cleanup handle for everything it opened.
pub struct AgentFactory {
    orchestrator: IntegrationOrchestrator,
    guardrails: GuardrailRegistry,
    universal: Arc<UniversalToolRegistry>,
}

impl AgentFactory {
    pub fn new(
        orchestrator: IntegrationOrchestrator,
        guardrails: GuardrailRegistry,
        universal: Arc<UniversalToolRegistry>,
    ) -> Self {
        Self {
            orchestrator,
            guardrails,
            universal,
        }
    }

    /// Build a runnable agent from its declarative definition.
    ///
    /// Per-integration failures are non-fatal and reflected in the report;
    /// the only fatal conditions are an inactive agent and unresolvable
    /// instructions or model.
    pub async fn create(
        &self,
        definition: &AgentDefinition,
        ctx: &RequestContext,
    ) -> Result<(AssembledAgent, SourceCleanup)> {
        if !definition.is_active {
            return Err(SwitchyardError::AgentInactive(definition.id.clone()));
        }
        if definition.instructions.trim().is_empty() || definition.model.trim().is_empty() {
            return Err(SwitchyardError::Configuration(format!(
                "agent '{}' has no resolvable instructions or model",
                definition.id
            )));
        }

        let acquired = self.orchestrator.acquire(definition, ctx).await;

        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut hosted_tools = Vec::new();
        for source in &acquired.sources {
            match source {
                ToolSource::Hosted(reference) => hosted_tools.push(reference.clone()),
                ToolSource::Server(handle) => match handle.list_tools().await {
                    Ok(schemas) => {
                        for schema in schemas {
                            tools.push(Arc::new(ServerTool::new(handle.clone(), schema)));
                        }
                    }
                    Err(error) => {
                        // Connected but unenumerable; the agent proceeds
                        // without this integration's tools.
                        tracing::warn!(
                            integration = %handle.integration(),
                            error = %error,
                            "Tool enumeration failed"
                        );
                    }
                },
            }
        }

        let universal = self.universal.get_all_tools(&definition.selected_tools);
        tools.extend(universal.custom_tools);

        let guardrail_spec = guardrail_spec_from_rules(&definition.rules);
        let input_guardrails = self.guardrails.input_guardrails(&guardrail_spec);
        let output_guardrails = self.guardrails.output_guardrails(&guardrail_spec);

        let overrides = strip_reserved_overrides(&definition.rules);

        let cleanup = SourceCleanup::new(acquired.sources);
        let agent = AssembledAgent {
            instructions: definition.instructions.clone(),
            model: definition.model.clone(),
            tools,
            hosted_tools,
            input_guardrails,
            output_guardrails,
            overrides,
            report: acquired.report,
        };

        tracing::info!(
            agent = %definition.id,
            organization = %ctx.organization_id,
            tools = agent.tools.len(),
            hosted_tools = agent.hosted_tools.len(),
            "Assembled agent"
        );
        Ok((agent, cleanup))
    }
}

fn guardrail_spec_from_rules(rules: &serde_json::Value) -> GuardrailSpec {
    match rules.get("guardrails") {
        Some(block) => serde_json::from_value(block.clone()).unwrap_or_else(|error| {
            tracing::warn!(error = %error, "Malformed guardrails block, using empty pipelines");
            GuardrailSpec::default()
        }),
        None => GuardrailSpec::default(),
    }
}

fn strip_reserved_overrides(
    rules: &serde_json::Value,
) -> serde_json::Map<String, serde_json::Value> {
    let Some(map) = rules.as_object() else {
        return serde_json::Map::new();
    };
    map.iter()
        .filter(|(key, _)| !RESERVED_OVERRIDE_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
