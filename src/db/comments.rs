use std::collections::HashMap;

use async_std::sync::RwLock;
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::Error;
use crate::models::comments::{storage_key, Comment};
use memory_lane_api_structs::CommentPayload;

/// Plain key/value storage; comment lists are stored whole as JSON.
#[async_trait::async_trait]
pub trait CommentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    async fn put(&self, key: &str, value: String) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl CommentStore for PgPool {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let row = sqlx::query(
            r#"
                SELECT
                    value
                FROM
                    key_value_store
                WHERE
                    key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(self)
        .await?;

        Ok(match row {
            Some(row) => Some(row.try_get("value")?),
            None => None,
        })
    }

    async fn put(&self, key: &str, value: String) -> Result<(), Error> {
        sqlx::query(
            r#"
                INSERT INTO key_value_store
                    (key, value)
                VALUES
                    ($1, $2)
                ON CONFLICT (key) DO UPDATE
                SET
                    value = EXCLUDED.value,
                    updated_at = now()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(self)
        .await?;

        Ok(())
    }
}

/// Process-local store, used when no database is configured. Contents are
/// lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CommentStore for MemoryCommentStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: String) -> Result<(), Error> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

pub async fn get_comments(store: &dyn CommentStore, photo_id: &str) -> Result<Vec<Comment>, Error> {
    match store.get(&storage_key(photo_id)).await? {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(Vec::new()),
    }
}

/// Appends to the stored list with a read-modify-write; concurrent writers
/// to the same photo can lose entries.
pub async fn add_comment(
    store: &dyn CommentStore,
    photo_id: &str,
    payload: CommentPayload,
) -> Result<Vec<Comment>, Error> {
    let mut comments = get_comments(store, photo_id).await?;
    comments.push(Comment::new(payload));

    store
        .put(&storage_key(photo_id), serde_json::to_string(&comments)?)
        .await?;

    Ok(comments)
}
