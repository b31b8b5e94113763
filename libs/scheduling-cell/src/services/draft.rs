use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

/// Partially filled booking forms, keyed by whatever the caller uses to
/// identify a form (usually user id plus clinic id).
#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, key: &str, draft: Value);
    async fn load(&self, key: &str) -> Option<Value>;
    async fn clear(&self, key: &str);
}

#[derive(Default)]
pub struct InMemoryDraftStore {
    drafts: RwLock<HashMap<String, Value>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DraftStore for InMemoryDraftStore {
    async fn save(&self, key: &str, draft: Value) {
        debug!("Saving booking draft {}", key);
        self.drafts.write().await.insert(key.to_string(), draft);
    }

    async fn load(&self, key: &str) -> Option<Value> {
        self.drafts.read().await.get(key).cloned()
    }

    async fn clear(&self, key: &str) {
        if self.drafts.write().await.remove(key).is_some() {
            debug!("Cleared booking draft {}", key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_load_clear() {
        let store = InMemoryDraftStore::new();
        assert!(store.load("form-1").await.is_none());

        store.save("form-1", json!({ "date": "2025-03-10" })).await;
        store.save("form-1", json!({ "date": "2025-03-11", "time_slot": "09:00" })).await;
        assert_eq!(store.load("form-1").await.unwrap()["date"], "2025-03-11");
        assert!(store.load("form-2").await.is_none());

        store.clear("form-1").await;
        assert!(store.load("form-1").await.is_none());
    }
}
