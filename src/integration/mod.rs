//! Integration configuration records and descriptor snapshots.

pub mod credentials;

pub use credentials::{CredentialResolver, PassthroughCredentialResolver};

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;

/// Closed set of tool-transport kinds an integration can use.
///
/// Adding a transport means adding a variant here and covering it in every
/// `match`, which the compiler checks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IntegrationKind {
    /// Tools delegated entirely to a remote provider-managed proxy.
    Hosted,
    /// Persistent streaming HTTP connection to a tool server.
    Http,
    /// Local child process speaking over stdio.
    Stdio,
    /// Vendor tool handlers resolved outside the transport layer.
    VendorBuiltin,
}

/// Persisted integration record, as provided by the catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: String,
    pub kind: IntegrationKind,
    pub name: String,
    /// Opaque credential document; shape depends on `kind`. May be stored
    /// encrypted, in which case the credential resolver decrypts it.
    pub credentials: serde_json::Value,
    pub is_active: bool,
}

/// Join record linking an agent to one of its enabled integrations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIntegration {
    pub integration_id: String,
    pub is_enabled: bool,
    #[serde(default)]
    pub selected_tools: Vec<String>,
    /// Free-form per-integration configuration.
    #[serde(default)]
    pub config: serde_json::Value,
}

/// Declarative agent configuration, as provided by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub model: String,
    pub is_active: bool,
    /// Free-form rules JSON the dashboard stores alongside the agent.
    #[serde(default)]
    pub rules: serde_json::Value,
    /// Universal tools the agent itself opted into (empty means all).
    #[serde(default)]
    pub selected_tools: Vec<String>,
    #[serde(default)]
    pub integrations: Vec<AgentIntegration>,
}

/// Declared guardrail configuration on an agent's rules document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardrailSpec {
    #[serde(default)]
    pub input: Vec<String>,
    #[serde(default)]
    pub output: Vec<String>,
    #[serde(default)]
    pub thresholds: serde_json::Value,
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

/// Immutable snapshot of one integration ready for adapter dispatch.
///
/// Built from the persisted [`Integration`] joined with its
/// [`AgentIntegration`] row; credentials are already decrypted.
#[derive(Debug, Clone)]
pub struct IntegrationDescriptor {
    pub kind: IntegrationKind,
    pub name: String,
    pub credentials: serde_json::Value,
    pub selected_tools: BTreeSet<String>,
    pub enabled: bool,
}

impl IntegrationDescriptor {
    pub fn from_records(integration: &Integration, link: &AgentIntegration) -> Self {
        Self {
            kind: integration.kind,
            name: integration.name.clone(),
            credentials: integration.credentials.clone(),
            selected_tools: link.selected_tools.iter().cloned().collect(),
            enabled: link.is_enabled && integration.is_active,
        }
    }

    /// Required string field from the credential document.
    pub fn credential_str(&self, key: &str) -> Result<&str> {
        self.credentials
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                crate::error::SwitchyardError::Configuration(format!(
                    "integration '{}' is missing credential field '{key}'",
                    self.name
                ))
            })
    }
}

/// Lookup of integration records by id, provided by the platform.
#[async_trait]
pub trait IntegrationCatalog: Send + Sync {
    async fn integration(&self, id: &str) -> Result<Option<Integration>>;
}
