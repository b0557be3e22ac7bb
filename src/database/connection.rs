use std::borrow::Cow;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use super::{child_key, normalize, Change, DocumentStore, StoreResult, CHANGE_CAPACITY};

pub struct Connection {
    pool: PgPool,
    changes: broadcast::Sender<Change>,
}

impl Connection {
    pub async fn connect(connection_string: Cow<'_, str>) -> StoreResult<Self> {
        let pool = PgPool::connect(&connection_string).await?;
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Ok(Self { pool, changes })
    }

    pub async fn perform_migration_if_needed(&self) -> StoreResult<()> {
        info!("Ensuring documents table exists");
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (path TEXT PRIMARY KEY, body JSONB NOT NULL)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn announce(&self, path: String, value: Option<Value>) {
        let _ = self.changes.send(Change { path, value });
    }
}

fn escape_like(path: &str) -> String {
    path.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[async_trait]
impl DocumentStore for Connection {
    async fn read(&self, path: &str) -> StoreResult<Option<Value>> {
        let path = normalize(path)?;
        let record: Option<(Json<Value>,)> =
            sqlx::query_as("SELECT body FROM documents WHERE path = $1")
                .bind(&path)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record.map(|(Json(body),)| body))
    }

    async fn children(&self, path: &str) -> StoreResult<Vec<(String, Value)>> {
        let path = normalize(path)?;
        let records: Vec<(String, Json<Value>)> = sqlx::query_as(
            "SELECT path, body FROM documents WHERE path LIKE $1 ESCAPE '\\' ORDER BY path COLLATE \"C\"",
        )
        .bind(format!("{}/%", escape_like(&path)))
        .fetch_all(&self.pool)
        .await?;

        Ok(records
            .into_iter()
            .filter_map(|(key, Json(body))| {
                child_key(&path, &key).map(|child| (child.to_owned(), body))
            })
            .collect())
    }

    #[instrument(level = "debug", skip(self, value))]
    async fn write(&self, path: &str, value: Value) -> StoreResult<()> {
        let path = normalize(path)?;
        sqlx::query(
            "INSERT INTO documents (path, body) VALUES ($1, $2) \
             ON CONFLICT (path) DO UPDATE SET body = EXCLUDED.body",
        )
        .bind(&path)
        .bind(Json(&value))
        .execute(&self.pool)
        .await?;

        self.announce(path, Some(value));
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn remove(&self, path: &str) -> StoreResult<()> {
        let path = normalize(path)?;
        let deleted = sqlx::query("DELETE FROM documents WHERE path = $1 OR path LIKE $2 ESCAPE '\\'")
            .bind(&path)
            .bind(format!("{}/%", escape_like(&path)))
            .execute(&self.pool)
            .await?;
        debug!(removed = deleted.rows_affected(), "documents removed");

        self.announce(path, None);
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
