//! Convenience re-exports for embedding applications.

pub use crate::config::{Posture, RuntimeSettings};
pub use crate::context::RequestContext;
pub use crate::error::{Result, SwitchyardError};
pub use crate::factory::{AgentDefinitionSource, AgentFactory, AssembledAgent, SourceCleanup};
pub use crate::guardrails::{Guardrail, GuardrailRegistry, GuardrailVerdict};
pub use crate::integration::{
    AgentDefinition, AgentIntegration, CredentialResolver, Integration, IntegrationCatalog,
    IntegrationDescriptor, IntegrationKind,
};
pub use crate::orchestrator::{AcquisitionReport, IntegrationOrchestrator};
pub use crate::session::{
    spawn_sweeper, ConversationStore, MessageRole, SessionRecord, SessionStore, Thread,
};
pub use crate::tools::{Tool, ToolArguments, UniversalToolRegistry};
pub use crate::transport::{FilterEffect, ToolSource};
