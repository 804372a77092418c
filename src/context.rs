//! Explicit request context passed through factory and session APIs.

/// Identifiers describing the request a construction or session operation
/// belongs to.
///
/// Passed explicitly instead of living in ambient/task-local state so that
/// telemetry tagging is visible at call sites and tests stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub organization_id: String,
    pub agent_id: String,
    pub conversation_id: Option<String>,
}

impl RequestContext {
    pub fn new(organization_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            agent_id: agent_id.into(),
            conversation_id: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}
