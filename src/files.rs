//! File lifecycle: keeps blob writes/deletes and metadata rows in step.
//!
//! Both protocols are ordered and non-compensating. Create writes the blob
//! before the row; Delete removes the blob before the row. A failure in the
//! second step is reported to the caller and logged with the storage key; it
//! is never rolled back or retried here.

use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::errors::ApiError;
use crate::keys::KeyClock;
use crate::models::File;
use crate::pagination::{Page, PageRequest, Pagination};
use crate::storage::{BlobStore, ByteStream, FileRepository};

pub struct NewUpload<'a> {
    pub filename: String,
    pub content_type: String,
    pub collection_id: Option<Uuid>,
    pub body: ByteStream<'a>,
}

pub struct FileService {
    blobs: Arc<dyn BlobStore>,
    repo: Arc<dyn FileRepository>,
    clock: KeyClock,
}

impl FileService {
    pub fn new(blobs: Arc<dyn BlobStore>, repo: Arc<dyn FileRepository>) -> Self {
        Self { blobs, repo, clock: KeyClock::new() }
    }

    pub async fn create(&self, owner_id: &str, upload: NewUpload<'_>) -> Result<File, ApiError> {
        let now = Utc::now();
        let storage_key = self.clock.key_for(owner_id, now, &upload.filename);

        let size_bytes = self.blobs.put(&storage_key, upload.body).await?;

        let file = File {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            collection_id: upload.collection_id,
            storage_key,
            display_name: upload.filename,
            size_bytes,
            content_type: upload.content_type,
            uploaded_at: now,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.repo.insert(&file).await {
            log::error!(
                "orphan blob: metadata insert failed after blob write (key={:?}, owner={}): {e}",
                file.storage_key, owner_id
            );
            return Err(e.into());
        }
        log::info!("stored file {} ({} bytes) for {}", file.id, file.size_bytes, owner_id);
        Ok(file)
    }

    pub async fn list(&self, owner_id: &str, req: PageRequest) -> Result<Page<File>, ApiError> {
        let files = self
            .repo
            .list_by_owner(owner_id, req.page_size(), req.offset())
            .await?;
        let total_count = self.repo.count_by_owner(owner_id).await?;
        Ok(Page { files, pagination: Pagination::compute(total_count, req) })
    }

    pub async fn delete(&self, owner_id: &str, id: Uuid) -> Result<(), ApiError> {
        let file = self
            .repo
            .get_by_id_and_owner(id, owner_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        self.blobs.delete(&file.storage_key).await?;

        match self.repo.delete_by_id(file.id).await {
            Ok(true) => {
                log::info!("deleted file {} for {}", file.id, owner_id);
                Ok(())
            }
            // a concurrent delete removed the row first
            Ok(false) => Err(ApiError::NotFound),
            Err(e) => {
                log::error!(
                    "dangling row: metadata delete failed after blob delete (id={}, key={:?}): {e}",
                    file.id, file.storage_key
                );
                Err(e.into())
            }
        }
    }

    /// Fetches an owned file's record and content.
    pub async fn open(&self, owner_id: &str, id: Uuid) -> Result<(File, Bytes), ApiError> {
        let file = self
            .repo
            .get_by_id_and_owner(id, owner_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let data = self.blobs.get(&file.storage_key).await.map_err(|e| {
            log::error!("blob missing or unreadable for file {}: {e}", file.id);
            ApiError::StorageFailure
        })?;
        Ok((file, data))
    }
}
