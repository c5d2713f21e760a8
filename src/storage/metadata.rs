//! Metadata store: durable `File` rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use crate::db::Db;
use crate::errors::StoreError;
use crate::models::File;

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn insert(&self, file: &File) -> Result<(), StoreError>;

    /// `None` both when the id is unknown and when it belongs to someone else.
    async fn get_by_id_and_owner(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<Option<File>, StoreError>;

    /// Returns whether a row was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, StoreError>;

    /// Rows in insertion order.
    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<File>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteFileRepository {
    db: Db,
}

impl SqliteFileRepository {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

const FILE_COLUMNS: &str =
    "id, user_id, collection_id, storage_key, name, size_bytes, content_type, uploaded_at, created_at, updated_at";

fn parse_uuid(raw: &str, column: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("{column} {raw:?}: {e}")))
}

fn file_from_row(row: &SqliteRow) -> Result<File, StoreError> {
    let id: String = row.try_get("id")?;
    let collection_id: Option<String> = row.try_get("collection_id")?;
    let size: i64 = row.try_get("size_bytes")?;
    Ok(File {
        id: parse_uuid(&id, "id")?,
        owner_id: row.try_get("user_id")?,
        collection_id: collection_id
            .as_deref()
            .map(|c| parse_uuid(c, "collection_id"))
            .transpose()?,
        storage_key: row.try_get("storage_key")?,
        display_name: row.try_get("name")?,
        size_bytes: u64::try_from(size)
            .map_err(|_| StoreError::Corrupt(format!("size_bytes {size}")))?,
        content_type: row.try_get("content_type")?,
        uploaded_at: row.try_get::<DateTime<Utc>, _>("uploaded_at")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

#[async_trait]
impl FileRepository for SqliteFileRepository {
    async fn insert(&self, file: &File) -> Result<(), StoreError> {
        let size = i64::try_from(file.size_bytes)
            .map_err(|_| StoreError::Corrupt(format!("size_bytes {}", file.size_bytes)))?;
        sqlx::query("INSERT INTO files(id, user_id, collection_id, storage_key, name, size_bytes, content_type, uploaded_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)")
            .bind(file.id.to_string())
            .bind(&file.owner_id)
            .bind(file.collection_id.map(|c| c.to_string()))
            .bind(&file.storage_key)
            .bind(&file.display_name)
            .bind(size)
            .bind(&file.content_type)
            .bind(file.uploaded_at)
            .bind(file.created_at)
            .bind(file.updated_at)
            .execute(&self.db.0)
            .await?;
        Ok(())
    }

    async fn get_by_id_and_owner(
        &self,
        id: Uuid,
        owner_id: &str,
    ) -> Result<Option<File>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ? AND user_id = ?"
        ))
        .bind(id.to_string())
        .bind(owner_id)
        .fetch_optional(&self.db.0)
        .await?;
        row.as_ref().map(file_from_row).transpose()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.db.0)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_by_owner(&self, owner_id: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM files WHERE user_id = ?")
            .bind(owner_id)
            .fetch_one(&self.db.0)
            .await?
            .try_get("n")?;
        Ok(count.max(0) as u64)
    }

    async fn list_by_owner(
        &self,
        owner_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<File>, StoreError> {
        let offset = i64::try_from(offset)
            .map_err(|_| StoreError::Corrupt(format!("offset {offset}")))?;
        let rows = sqlx::query(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE user_id = ? ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.db.0)
        .await?;
        rows.iter().map(file_from_row).collect()
    }
}
