use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, instrument};

use super::{child_key, is_within, normalize, Change, DocumentStore, StoreResult, CHANGE_CAPACITY};

pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Value>>,
    changes: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            documents: RwLock::new(BTreeMap::new()),
            changes,
        }
    }

    fn announce(&self, path: String, value: Option<Value>) {
        // Nobody listening is fine.
        let _ = self.changes.send(Change { path, value });
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        let path = normalize(path)?;
        Ok(self.documents.read().await.get(&path).cloned())
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<(String, Value)>> {
        let path = normalize(path)?;
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter_map(|(key, value)| {
                child_key(&path, key).map(|child| (child.to_owned(), value.clone()))
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn write(&self, path: &str, value: Value) -> StoreResult<()> {
        let path = normalize(path)?;
        self.documents
            .write()
            .await
            .insert(path.clone(), value.clone());
        self.announce(path, Some(value));
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn remove(&self, path: &str) -> StoreResult<()> {
        let path = normalize(path)?;
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|key, _| !is_within(&path, key));
        debug!(removed = before - documents.len(), "documents removed");
        drop(documents);
        self.announce(path, None);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn write_read_and_list_children() {
        let store = MemoryStore::new();
        store.write("quizzes/q1", json!({ "title": "Capitals" })).await.unwrap();
        store.write("quizzes/q2", json!({ "title": "Rivers" })).await.unwrap();
        store
            .write("quizzes/q1/questions/a", json!({ "label": "France?" }))
            .await
            .unwrap();

        assert_eq!(
            store.read("/quizzes/q1/").await.unwrap(),
            Some(json!({ "title": "Capitals" }))
        );
        let children = store.children("quizzes").await.unwrap();
        let keys: Vec<_> = children.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["q1", "q2"]);
    }

    #[tokio::test]
    async fn remove_cascades_to_descendants() {
        let store = MemoryStore::new();
        store.write("quizzes/q1", json!({})).await.unwrap();
        store.write("quizzes/q1/questions/a", json!({})).await.unwrap();
        store.write("quizzes/q10", json!({})).await.unwrap();

        store.remove("quizzes/q1").await.unwrap();

        assert_eq!(store.read("quizzes/q1/questions/a").await.unwrap(), None);
        assert!(store.read("quizzes/q10").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn subscription_follows_writes_and_ancestor_removal() {
        let store = MemoryStore::new();
        store.write("quizzes/q1/questions/a", json!({ "label": "v1" })).await.unwrap();

        let mut sub = store.subscribe("quizzes/q1/questions/a").await.unwrap();
        assert_eq!(sub.current(), Some(&json!({ "label": "v1" })));

        store.write("quizzes/q1/questions/b", json!({})).await.unwrap();
        store.write("quizzes/q1/questions/a", json!({ "label": "v2" })).await.unwrap();
        assert_eq!(sub.next().await, Some(Some(json!({ "label": "v2" }))));

        store.remove("quizzes/q1").await.unwrap();
        assert_eq!(sub.next().await, Some(None));
        assert_eq!(sub.current(), None);
    }

    #[tokio::test]
    async fn catch_up_applies_pending_changes_only() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("quizzes/q1").await.unwrap();
        assert!(!sub.catch_up());

        store.write("quizzes/q2", json!({})).await.unwrap();
        assert!(!sub.catch_up());

        store.write("quizzes/q1", json!({ "title": "Rivers" })).await.unwrap();
        assert!(sub.catch_up());
        assert_eq!(sub.current(), Some(&json!({ "title": "Rivers" })));
    }
}
