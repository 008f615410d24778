//! Conversation state persistence.
//!
//! The store is the single source of truth for everything that must survive
//! between turns: the dialog-stack snapshot (scoped to a conversation) and
//! the buffered pre-login command (scoped to a user). A write flushed at the
//! end of turn N is visible at the start of turn N+1 for the same
//! conversation, even when the turns are handled by different worker
//! instances.
//!
//! Two backends: [`MemoryStateStore`] (tests, single-process deployments)
//! and [`SqliteStateStore`] (durable).

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use mailseek_core::ConversationRef;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryStateStore;
pub use sqlite::{connect_with_settings, DbPool, SqliteStateStore};

pub const SLOT_DIALOG_STATE: &str = "dialog_state";
pub const SLOT_COMMAND_BUFFER: &str = "command_buffer";

/// Partition key for one state slot. Conversation-scoped slots leave
/// `user_id` empty; user-scoped slots leave `conversation_id` empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateScope {
    pub channel_id: String,
    pub conversation_id: String,
    pub user_id: String,
}

impl StateScope {
    pub fn conversation(reference: &ConversationRef) -> Self {
        Self {
            channel_id: reference.channel_id.clone(),
            conversation_id: reference.conversation_id.clone(),
            user_id: String::new(),
        }
    }

    pub fn user(reference: &ConversationRef) -> Self {
        Self {
            channel_id: reference.channel_id.clone(),
            conversation_id: String::new(),
            user_id: reference.user_id.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state store backend failure: {0}")]
    Backend(String),
    #[error("state snapshot could not be encoded or decoded: {0}")]
    Codec(String),
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, scope: &StateScope, slot: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, scope: &StateScope, slot: &str, value: &str) -> Result<(), StoreError>;
    async fn delete(&self, scope: &StateScope, slot: &str) -> Result<(), StoreError>;
}

/// Conversation-scoped dialog-stack snapshot, serialized as JSON.
#[derive(Clone)]
pub struct DialogStateAccessor {
    store: Arc<dyn StateStore>,
}

impl DialogStateAccessor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn load<T>(&self, conversation: &ConversationRef) -> Result<Option<T>, StoreError>
    where
        T: DeserializeOwned,
    {
        let scope = StateScope::conversation(conversation);
        let Some(raw) = self.store.get(&scope, SLOT_DIALOG_STATE).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|error| StoreError::Codec(error.to_string()))
    }

    pub async fn save<T>(&self, conversation: &ConversationRef, state: &T) -> Result<(), StoreError>
    where
        T: Serialize,
    {
        let scope = StateScope::conversation(conversation);
        let raw =
            serde_json::to_string(state).map_err(|error| StoreError::Codec(error.to_string()))?;
        self.store.set(&scope, SLOT_DIALOG_STATE, &raw).await
    }
}

/// User-scoped buffered command. At most one buffered command per user;
/// a later write silently replaces an earlier unconsumed one.
#[derive(Clone)]
pub struct CommandBufferAccessor {
    store: Arc<dyn StateStore>,
}

impl CommandBufferAccessor {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, conversation: &ConversationRef) -> Result<Option<String>, StoreError> {
        self.store.get(&StateScope::user(conversation), SLOT_COMMAND_BUFFER).await
    }

    pub async fn set(&self, conversation: &ConversationRef, text: &str) -> Result<(), StoreError> {
        self.store.set(&StateScope::user(conversation), SLOT_COMMAND_BUFFER, text).await
    }

    pub async fn clear(&self, conversation: &ConversationRef) -> Result<(), StoreError> {
        self.store.delete(&StateScope::user(conversation), SLOT_COMMAND_BUFFER).await
    }

    /// Reads and clears in one call, defaulting to an empty string when
    /// nothing was buffered. Used when resuming the pre-login command.
    pub async fn consume(&self, conversation: &ConversationRef) -> Result<String, StoreError> {
        let buffered = self.get(conversation).await?.unwrap_or_default();
        self.clear(conversation).await?;
        Ok(buffered)
    }
}
