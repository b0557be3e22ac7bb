//! Documents are JSON values stored under `/`-separated paths such as
//! `quizzes/{quiz}/questions/{question}`. Every write and removal is
//! broadcast as a [`Change`] so views can follow a path live.

pub mod connection;
pub mod memory;
pub mod quiz;
pub mod repository;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

pub use connection::Connection;
pub use memory::MemoryStore;
pub use repository::QuizRepository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed document at '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid path '{0}'")]
    InvalidPath(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A write (`Some`) or removal (`None`) at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub path: String,
    pub value: Option<Value>,
}

pub(crate) const CHANGE_CAPACITY: usize = 256;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>>;

    /// Direct children of `path`, keyed by their last path segment.
    async fn children(&self, path: &str) -> StoreResult<Vec<(String, Value)>>;

    async fn write(&self, path: &str, value: Value) -> StoreResult<()>;

    /// Removes `path` and everything below it.
    async fn remove(&self, path: &str) -> StoreResult<()>;

    fn changes(&self) -> broadcast::Receiver<Change>;

    async fn subscribe(&self, path: &str) -> StoreResult<Subscription> {
        let path = normalize(path)?;
        let rx = self.changes();
        let current = self.read(&path).await?;
        Ok(Subscription { path, current, rx })
    }
}

pub fn normalize(path: &str) -> StoreResult<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() || trimmed.split('/').any(|segment| segment.trim().is_empty()) {
        return Err(StoreError::InvalidPath(path.to_owned()));
    }
    Ok(trimmed.to_owned())
}

pub fn join(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child.trim_start_matches('/'))
}

/// A fresh key for a new child document. Keys sort in creation order, also
/// within one microsecond, so children list the way they were added.
pub fn new_key() -> String {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default();
    let previous = LAST
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(now);
    let stamp = now.max(previous + 1);
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{stamp:014x}{}", &suffix[..10])
}

pub(crate) fn child_key<'a>(parent: &str, path: &'a str) -> Option<&'a str> {
    path.strip_prefix(parent)?
        .strip_prefix('/')
        .filter(|rest| !rest.is_empty() && !rest.contains('/'))
}

pub(crate) fn is_within(parent: &str, path: &str) -> bool {
    path == parent
        || path
            .strip_prefix(parent)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Live view of one path. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    current: Option<Value>,
    rx: broadcast::Receiver<Change>,
}

impl Subscription {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    /// Waits for the next change of the watched value. `None` once the store is gone.
    pub async fn next(&mut self) -> Option<Option<Value>> {
        loop {
            match self.rx.recv().await {
                Ok(change) => {
                    if let Some(value) = self.apply(change) {
                        return Some(value);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(path = %self.path, skipped, "subscription lagged behind store changes");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Applies changes that already arrived, without waiting. `true` when the
    /// watched value changed.
    pub fn catch_up(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.rx.try_recv() {
                Ok(change) => changed |= self.apply(change).is_some(),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(path = %self.path, skipped, "subscription lagged behind store changes");
                }
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return changed;
                }
            }
        }
    }

    fn apply(&mut self, change: Change) -> Option<Option<Value>> {
        let removed_above = change.value.is_none() && is_within(&change.path, &self.path);
        if change.path == self.path || removed_above {
            self.current = change.value.clone();
            return Some(change.value);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_keys_sort_in_creation_order() {
        let keys: Vec<String> = (0..64).map(|_| new_key()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        sorted.dedup();
        assert_eq!(sorted.len(), keys.len());
    }

    #[test]
    fn normalize_trims_and_rejects_empty_segments() {
        assert_eq!(normalize("/quizzes/q1/").unwrap(), "quizzes/q1");
        assert!(matches!(normalize(""), Err(StoreError::InvalidPath(_))));
        assert!(matches!(normalize("quizzes//q1"), Err(StoreError::InvalidPath(_))));
    }

    #[test]
    fn child_key_only_matches_direct_children() {
        assert_eq!(child_key("quizzes", "quizzes/q1"), Some("q1"));
        assert_eq!(child_key("quizzes", "quizzes/q1/questions/a"), None);
        assert_eq!(child_key("quizzes", "quizzesX/q1"), None);
        assert_eq!(child_key("quizzes", "quizzes"), None);
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("quizzes/q1", "quizzes/q1"));
        assert!(is_within("quizzes/q1", "quizzes/q1/questions/a"));
        assert!(!is_within("quizzes/q1", "quizzes/q10"));
    }
}
