//! In-memory session store: process-lifetime conversations keyed by session id.

use async_trait::async_trait;
use dashmap::DashMap;
use medbridge_core::error::StoreError;
use medbridge_core::message::Conversation;
use medbridge_core::session::SessionStore;
use tracing::debug;

/// Conversations held in process memory in a concurrent map, so operations
/// on different keys do not serialize behind one lock.
///
/// Nothing is ever evicted: the map grows until the process exits.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Conversation>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Conversation>, StoreError> {
        Ok(self.sessions.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, conversation: Conversation) -> Result<(), StoreError> {
        let replaced = self.sessions.insert(key.to_string(), conversation).is_some();
        debug!(session = %key, replaced, "Session stored");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.remove(key).is_some())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.sessions.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medbridge_core::message::{Language, Message};
    use std::sync::Arc;

    fn conversation(fio: &str) -> Conversation {
        Conversation::new(fio, Language::Ru, "system prompt")
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemorySessionStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_and_get() {
        let store = InMemorySessionStore::new();
        store.set("s1", conversation("Иванов")).await.unwrap();

        let loaded = store.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.fio, "Иванов");
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn set_replaces_whole_conversation() {
        let store = InMemorySessionStore::new();
        let mut first = conversation("A");
        first.push(Message::user("hello"));
        store.set("s1", first).await.unwrap();

        store.set("s1", conversation("B")).await.unwrap();

        let loaded = store.get("s1").await.unwrap().unwrap();
        assert_eq!(loaded.fio, "B");
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_returns_a_copy() {
        let store = InMemorySessionStore::new();
        store.set("s1", conversation("A")).await.unwrap();

        let mut copy = store.get("s1").await.unwrap().unwrap();
        copy.push(Message::user("not persisted"));

        assert_eq!(store.get("s1").await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_presence() {
        let store = InMemorySessionStore::new();
        store.set("s1", conversation("A")).await.unwrap();

        assert!(store.delete("s1").await.unwrap());
        assert!(!store.delete("s1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn any_non_empty_key_accepted() {
        let store = InMemorySessionStore::new();
        for key in ["a", "session with spaces", "🙂", "x/y/z"] {
            store.set(key, conversation(key)).await.unwrap();
        }
        assert_eq!(store.count().await.unwrap(), 4);
        assert_eq!(store.get("🙂").await.unwrap().unwrap().fio, "🙂");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_on_distinct_keys() {
        let store = Arc::new(InMemorySessionStore::new());

        let mut handles = Vec::new();
        for i in 0..64 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let key = format!("session-{i}");
                store.set(&key, conversation(&key)).await.unwrap();
                let loaded = store.get(&key).await.unwrap().unwrap();
                assert_eq!(loaded.fio, key);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 64);
    }
}
