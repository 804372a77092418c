//! Durable conversation persistence seam.
//!
//! The external conversation/message store is the sole source of truth for
//! thread content across restarts; the session cache only ever holds derived
//! copies.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SwitchyardError};

use super::thread::MessageRole;

/// Durable conversation row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedConversation {
    pub id: Uuid,
    pub organization_id: String,
    pub agent_id: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable message row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMessage {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Monotonic position within the conversation.
    pub seq: u64,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new conversation row.
#[derive(Debug, Clone)]
pub struct NewConversation {
    pub organization_id: String,
    pub agent_id: String,
    pub session_id: String,
}

/// Fields for a new message row; `seq` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub role: MessageRole,
    pub content: String,
}

/// Filter for conversation lookups.
#[derive(Debug, Clone, Default)]
pub struct ConversationQuery {
    pub session_id: Option<String>,
    pub limit: Option<usize>,
}

/// Durable conversation/message store, provided by the platform.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Conversations for an organization, newest activity first.
    async fn conversations(
        &self,
        organization_id: &str,
        query: ConversationQuery,
    ) -> Result<Vec<PersistedConversation>>;

    async fn conversation_by_id(&self, id: Uuid) -> Result<Option<PersistedConversation>>;

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<PersistedConversation>;

    /// Bump a conversation's `updated_at`.
    async fn touch_conversation(&self, id: Uuid) -> Result<()>;

    async fn create_message(&self, message: NewMessage) -> Result<PersistedMessage>;

    /// Messages of a conversation in append order.
    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<PersistedMessage>>;
}

/// In-memory store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    inner: tokio::sync::RwLock<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    conversations: Vec<PersistedConversation>,
    messages: std::collections::HashMap<Uuid, Vec<PersistedMessage>>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn conversations(
        &self,
        organization_id: &str,
        query: ConversationQuery,
    ) -> Result<Vec<PersistedConversation>> {
        let inner = self.inner.read().await;
        let mut matched: Vec<PersistedConversation> = inner
            .conversations
            .iter()
            .filter(|conversation| conversation.organization_id == organization_id)
            .filter(|conversation| {
                query
                    .session_id
                    .as_deref()
                    .map_or(true, |session_id| conversation.session_id == session_id)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn conversation_by_id(&self, id: Uuid) -> Result<Option<PersistedConversation>> {
        let inner = self.inner.read().await;
        Ok(inner
            .conversations
            .iter()
            .find(|conversation| conversation.id == id)
            .cloned())
    }

    async fn create_conversation(
        &self,
        conversation: NewConversation,
    ) -> Result<PersistedConversation> {
        let now = Utc::now();
        let row = PersistedConversation {
            id: Uuid::new_v4(),
            organization_id: conversation.organization_id,
            agent_id: conversation.agent_id,
            session_id: conversation.session_id,
            created_at: now,
            updated_at: now,
        };
        self.inner.write().await.conversations.push(row.clone());
        Ok(row)
    }

    async fn touch_conversation(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        let conversation = inner
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == id)
            .ok_or_else(|| {
                SwitchyardError::Persistence(format!("conversation {id} not found"))
            })?;
        conversation.updated_at = Utc::now();
        Ok(())
    }

    async fn create_message(&self, message: NewMessage) -> Result<PersistedMessage> {
        let mut inner = self.inner.write().await;
        let entries = inner.messages.entry(message.conversation_id).or_default();
        let row = PersistedMessage {
            id: Uuid::new_v4(),
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            seq: entries.len() as u64 + 1,
            created_at: Utc::now(),
        };
        entries.push(row.clone());
        Ok(row)
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<PersistedMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
