//! In-memory conversation thread, derived from persisted messages.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::persist::PersistedMessage;

/// Author of one thread message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// One turn entry in a thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadMessage {
    pub role: MessageRole,
    pub content: String,
    pub seq: u64,
}

impl ThreadMessage {
    pub fn from_persisted(message: &PersistedMessage) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            seq: message.seq,
        }
    }
}

/// Ordered, append-only message history for one session.
///
/// A derived, rebuildable copy of the durable record; never the source of
/// truth. Rebuilding from the same persisted messages reproduces identical
/// ordering.
#[derive(Debug, Clone, Default)]
pub struct Thread {
    messages: Vec<ThreadMessage>,
}

impl Thread {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a thread from persisted messages, ordering by sequence.
    pub fn from_persisted(persisted: &[PersistedMessage]) -> Self {
        let mut sorted: Vec<&PersistedMessage> = persisted.iter().collect();
        sorted.sort_by_key(|message| (message.seq, message.created_at));
        Self {
            messages: sorted
                .into_iter()
                .map(ThreadMessage::from_persisted)
                .collect(),
        }
    }

    pub fn push(&mut self, message: ThreadMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ThreadMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn persisted(seq: u64, role: MessageRole, content: &str) -> PersistedMessage {
        PersistedMessage {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            role,
            content: content.into(),
            seq,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rebuild_orders_by_sequence_regardless_of_input_order() {
        let messages = vec![
            persisted(2, MessageRole::Assistant, "hi there"),
            persisted(1, MessageRole::User, "hello"),
            persisted(3, MessageRole::User, "how are you"),
        ];

        let thread = Thread::from_persisted(&messages);
        let sequence: Vec<(MessageRole, &str)> = thread
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            sequence,
            vec![
                (MessageRole::User, "hello"),
                (MessageRole::Assistant, "hi there"),
                (MessageRole::User, "how are you"),
            ]
        );
    }

    #[test]
    fn rebuild_is_deterministic() {
        let messages = vec![
            persisted(1, MessageRole::User, "a"),
            persisted(2, MessageRole::Assistant, "b"),
        ];
        let first = Thread::from_persisted(&messages);
        let second = Thread::from_persisted(&messages);
        assert_eq!(first.messages(), second.messages());
    }

    #[test]
    fn role_tags_round_trip() {
        assert_eq!("assistant".parse::<MessageRole>().unwrap(), MessageRole::Assistant);
        assert_eq!(MessageRole::User.to_string(), "user");
    }
}
