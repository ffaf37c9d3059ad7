//! Session store trait: keyed storage of conversation state.
//!
//! The store is the only shared mutable state in the system. Implementations
//! must allow concurrent access across different keys; operations on the
//! same key are serialized by the caller.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::Conversation;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Name of this backend (e.g., "in_memory").
    fn name(&self) -> &str;

    /// Fetch a copy of the conversation stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Conversation>, StoreError>;

    /// Insert or fully replace the conversation stored under `key`.
    async fn set(&self, key: &str, conversation: Conversation) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Number of stored sessions.
    async fn count(&self) -> Result<usize, StoreError>;
}
