//! Session store: TTL-evicted cache of live conversation state over the
//! durable conversation store.
//!
//! The cache holds what cannot be persisted (live agents, open transport
//! handles) next to a derived copy of the thread. Losing a cache entry is
//! never a correctness problem: on the next request the session is rebuilt
//! from persisted configuration and messages.

pub mod persist;
pub mod thread;

pub use persist::{
    ConversationQuery, ConversationStore, MemoryConversationStore, NewConversation, NewMessage,
    PersistedConversation, PersistedMessage,
};
pub use thread::{MessageRole, Thread, ThreadMessage};

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SessionSettings;
use crate::context::RequestContext;
use crate::error::{Result, SwitchyardError};
use crate::factory::{AgentDefinitionSource, AgentFactory, AssembledAgent, SourceCleanup};

/// Live state of one session: derived thread plus non-serializable runtime
/// objects.
pub struct SessionRecord {
    pub session_id: String,
    pub organization_id: String,
    pub agent_id: String,
    pub conversation_id: Uuid,
    pub agent: Arc<AssembledAgent>,
    cleanup: SourceCleanup,
    thread: tokio::sync::RwLock<Thread>,
    last_activity: std::sync::Mutex<Instant>,
}

impl SessionRecord {
    pub fn new(
        session_id: impl Into<String>,
        organization_id: impl Into<String>,
        agent_id: impl Into<String>,
        conversation_id: Uuid,
        thread: Thread,
        agent: AssembledAgent,
        cleanup: SourceCleanup,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            organization_id: organization_id.into(),
            agent_id: agent_id.into(),
            conversation_id,
            agent: Arc::new(agent),
            cleanup,
            thread: tokio::sync::RwLock::new(thread),
            last_activity: std::sync::Mutex::new(Instant::now()),
        }
    }

    /// Cleanup handle for the record's tool sources.
    pub fn cleanup(&self) -> &SourceCleanup {
        &self.cleanup
    }

    /// Snapshot of the in-memory thread.
    pub async fn thread(&self) -> Thread {
        self.thread.read().await.clone()
    }

    pub async fn thread_len(&self) -> usize {
        self.thread.read().await.len()
    }

    async fn append(&self, message: ThreadMessage) {
        self.thread.write().await.push(message);
    }

    fn touch(&self) {
        *self
            .last_activity
            .lock()
            .expect("activity lock should not be poisoned") = Instant::now();
    }

    fn last_activity(&self) -> Instant {
        *self
            .last_activity
            .lock()
            .expect("activity lock should not be poisoned")
    }
}

impl std::fmt::Debug for SessionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecord")
            .field("session_id", &self.session_id)
            .field("conversation_id", &self.conversation_id)
            .finish()
    }
}

#[derive(PartialEq, Eq)]
struct ExpiryKey {
    deadline: Instant,
    generation: u64,
    session_id: String,
}

impl Ord for ExpiryKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.deadline
            .cmp(&other.deadline)
            .then(self.generation.cmp(&other.generation))
            .then(self.session_id.cmp(&other.session_id))
    }
}

impl PartialOrd for ExpiryKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct CacheSlot {
    record: Arc<SessionRecord>,
    /// Bumped on every touch; expiry keys with an older generation are
    /// ignored by the sweep.
    generation: u64,
}

/// Arena of session entries plus a min-heap on activity deadlines, so the
/// sweep inspects only entries that could actually be due.
#[derive(Default)]
struct SessionCache {
    entries: HashMap<String, CacheSlot>,
    expiry: BinaryHeap<Reverse<ExpiryKey>>,
    generation_counter: u64,
}

impl SessionCache {
    fn push_expiry(&mut self, session_id: &str, generation: u64, ttl: Duration) {
        self.expiry.push(Reverse(ExpiryKey {
            deadline: Instant::now() + ttl,
            generation,
            session_id: session_id.to_owned(),
        }));
    }

    fn next_generation(&mut self) -> u64 {
        self.generation_counter += 1;
        self.generation_counter
    }
}

enum CacheLookup {
    Fresh(Arc<SessionRecord>),
    Stale(Arc<SessionRecord>),
    Miss,
}

/// TTL-evicted session cache backed by the durable conversation store.
pub struct SessionStore {
    conversations: Arc<dyn ConversationStore>,
    definitions: Arc<dyn AgentDefinitionSource>,
    factory: Arc<AgentFactory>,
    settings: SessionSettings,
    cache: tokio::sync::RwLock<SessionCache>,
}

impl SessionStore {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        definitions: Arc<dyn AgentDefinitionSource>,
        factory: Arc<AgentFactory>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            conversations,
            definitions,
            factory,
            settings,
            cache: tokio::sync::RwLock::new(SessionCache::default()),
        }
    }

    /// Number of cached sessions.
    pub async fn len(&self) -> usize {
        self.cache.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch the live session, rebuilding it from the durable store on a
    /// cache miss. Returns `None` when no matching conversation exists.
    ///
    /// An entry idle beyond the TTL is treated as a miss even if the sweep
    /// has not caught it yet; stale in-memory state is never returned.
    pub async fn get(
        &self,
        session_id: &str,
        ctx: &RequestContext,
    ) -> Result<Option<Arc<SessionRecord>>> {
        match self.lookup_and_touch(session_id).await {
            CacheLookup::Fresh(record) => return Ok(Some(record)),
            CacheLookup::Stale(record) => {
                tracing::debug!(session = %session_id, "Cached session idle beyond TTL, rebuilding");
                self.evict(&record).await;
            }
            CacheLookup::Miss => {}
        }

        let conversations = self
            .conversations
            .conversations(
                &ctx.organization_id,
                ConversationQuery {
                    session_id: Some(session_id.to_owned()),
                    limit: Some(1),
                },
            )
            .await
            .map_err(into_persistence)?;
        let Some(conversation) = conversations.into_iter().next() else {
            return Ok(None);
        };

        let messages = self
            .conversations
            .messages(conversation.id)
            .await
            .map_err(into_persistence)?;
        let definition = self
            .definitions
            .definition(&conversation.agent_id)
            .await?
            .ok_or_else(|| {
                SwitchyardError::Configuration(format!(
                    "agent '{}' behind session '{session_id}' no longer exists",
                    conversation.agent_id
                ))
            })?;

        let (agent, cleanup) = self.factory.create(&definition, ctx).await?;
        let record = SessionRecord::new(
            session_id,
            conversation.organization_id,
            conversation.agent_id,
            conversation.id,
            Thread::from_persisted(&messages),
            agent,
            cleanup,
        );
        Ok(Some(self.set(record).await))
    }

    /// Insert a freshly built record, replacing and closing any previous
    /// entry for the same session id (at most one live record per id).
    pub async fn set(&self, record: SessionRecord) -> Arc<SessionRecord> {
        let record = Arc::new(record);
        let ttl = self.settings.idle_ttl();

        let displaced = {
            let mut cache = self.cache.write().await;
            let generation = cache.next_generation();
            cache.push_expiry(&record.session_id, generation, ttl);
            cache.entries.insert(
                record.session_id.clone(),
                CacheSlot {
                    record: Arc::clone(&record),
                    generation,
                },
            )
        };

        if let Some(displaced) = displaced {
            tracing::warn!(
                session = %record.session_id,
                "Replacing live session record; closing displaced sources"
            );
            displaced.record.cleanup.close_all().await;
        }
        record
    }

    /// Append a message durably, then mirror it into the cached thread.
    ///
    /// The durable write comes first and its failure is fatal to the turn.
    /// The in-memory append is best-effort and can never independently fail
    /// the operation.
    pub async fn add_message(
        &self,
        session_id: &str,
        role: MessageRole,
        content: impl Into<String>,
        ctx: &RequestContext,
        conversation_id: Uuid,
    ) -> Result<PersistedMessage> {
        let persisted = self
            .conversations
            .create_message(NewMessage {
                conversation_id,
                role,
                content: content.into(),
            })
            .await
            .map_err(into_persistence)?;

        if let Err(error) = self.conversations.touch_conversation(conversation_id).await {
            tracing::warn!(
                conversation = %conversation_id,
                error = %error,
                "Failed to bump conversation activity"
            );
        }

        if let CacheLookup::Fresh(record) = self.lookup_and_touch(session_id).await {
            record.append(ThreadMessage::from_persisted(&persisted)).await;
        }

        tracing::debug!(
            session = %session_id,
            organization = %ctx.organization_id,
            seq = persisted.seq,
            "Appended message"
        );
        Ok(persisted)
    }

    /// Explicitly delete a session, closing its sources first.
    pub async fn remove(&self, session_id: &str) -> bool {
        let record = {
            let cache = self.cache.read().await;
            cache
                .entries
                .get(session_id)
                .map(|slot| Arc::clone(&slot.record))
        };
        match record {
            Some(record) => {
                self.evict(&record).await;
                true
            }
            None => false,
        }
    }

    /// Evict everything; used on process shutdown.
    pub async fn shutdown(&self) {
        let records: Vec<Arc<SessionRecord>> = {
            let mut cache = self.cache.write().await;
            cache.expiry.clear();
            cache
                .entries
                .drain()
                .map(|(_, slot)| slot.record)
                .collect()
        };
        let count = records.len();
        join_all(records.iter().map(|record| record.cleanup.close_all())).await;
        tracing::info!(sessions = count, "Session store shut down");
    }

    /// One eviction pass over entries whose activity deadline has passed.
    ///
    /// Runs the identical cleanup path as explicit deletes and never blocks
    /// request handling: candidates are collected from a snapshot, closed,
    /// then removed.
    pub async fn sweep_once(&self) -> usize {
        let ttl = self.settings.idle_ttl();
        let now = Instant::now();

        let candidates: Vec<Arc<SessionRecord>> = {
            let mut cache = self.cache.write().await;
            let mut due = Vec::new();
            loop {
                match cache.expiry.peek() {
                    Some(Reverse(key)) if key.deadline <= now => {}
                    _ => break,
                }
                let Reverse(key) = cache.expiry.pop().expect("peeked entry exists");
                if let Some(slot) = cache.entries.get(&key.session_id) {
                    let idle = now.duration_since(slot.record.last_activity());
                    if slot.generation == key.generation && idle >= ttl {
                        due.push(Arc::clone(&slot.record));
                    }
                }
            }
            due
        };

        let mut evicted = 0;
        for record in &candidates {
            if self.evict(record).await {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, "Evicted idle sessions");
        }
        evicted
    }

    /// Close a record's sources, then drop it from the cache.
    ///
    /// Sources reach closed state before the entry disappears. A request
    /// racing this eviction and touching the entry in between loses the
    /// entry anyway; its next access rebuilds from the durable store.
    async fn evict(&self, record: &Arc<SessionRecord>) -> bool {
        record.cleanup.close_all().await;

        let mut cache = self.cache.write().await;
        match cache.entries.get(&record.session_id) {
            Some(slot) if Arc::ptr_eq(&slot.record, record) => {
                cache.entries.remove(&record.session_id);
                true
            }
            _ => false,
        }
    }

    async fn lookup_and_touch(&self, session_id: &str) -> CacheLookup {
        let ttl = self.settings.idle_ttl();
        let mut cache = self.cache.write().await;
        let generation = cache.next_generation();
        let Some(slot) = cache.entries.get_mut(session_id) else {
            return CacheLookup::Miss;
        };

        let idle = Instant::now().duration_since(slot.record.last_activity());
        if idle >= ttl {
            return CacheLookup::Stale(Arc::clone(&slot.record));
        }

        slot.record.touch();
        slot.generation = generation;
        let record = Arc::clone(&slot.record);
        cache.push_expiry(session_id, generation, ttl);
        CacheLookup::Fresh(record)
    }
}

/// Run the eviction sweep on a fixed interval until the task is aborted.
///
/// Independent of request handling; embedders abort the returned handle (or
/// call [`SessionStore::shutdown`]) when the process stops.
pub fn spawn_sweeper(store: Arc<SessionStore>) -> tokio::task::JoinHandle<()> {
    let period = store.settings.sweep_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            store.sweep_once().await;
        }
    })
}

fn into_persistence(error: SwitchyardError) -> SwitchyardError {
    match error {
        SwitchyardError::Persistence(_) => error,
        other => SwitchyardError::Persistence(other.to_string()),
    }
}
