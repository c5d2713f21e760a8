//! Blob store client: opaque content addressed by storage key.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::LocalBoxStream;
use futures_util::TryStreamExt as _;
use sanitize_filename::{sanitize_with_options, Options};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;

use crate::errors::BlobError;

/// Upload body as it arrives from the client.
pub type ByteStream<'a> = LocalBoxStream<'a, Result<Bytes, BlobError>>;

#[async_trait(?Send)]
pub trait BlobStore: Send + Sync {
    /// Stores the stream under `key` and returns the number of bytes written.
    /// A failed put leaves nothing behind under `key`.
    async fn put(&self, key: &str, body: ByteStream<'_>) -> Result<u64, BlobError>;

    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}

/// Blobs as files in a single directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `{prefix}-{blake3(key)}`: the prefix is a readable slice of the key,
    /// the digest keeps names distinct. Always well under 255 bytes, `.part`
    /// suffix included.
    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(blob_file_name(key))
    }
}

const NAME_PREFIX_BYTES: usize = 48;

fn blob_file_name(key: &str) -> String {
    let readable = sanitize_with_options(
        key,
        Options { windows: cfg!(windows), truncate: true, replacement: "_" },
    );
    let mut end = readable.len().min(NAME_PREFIX_BYTES);
    while !readable.is_char_boundary(end) {
        end -= 1;
    }
    let prefix = &readable[..end];
    let digest = blake3::hash(key.as_bytes());
    format!("{prefix}-{}", hex::encode(digest.as_bytes()))
}

#[async_trait(?Send)]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, mut body: ByteStream<'_>) -> Result<u64, BlobError> {
        let path = self.path_for(key);
        let mut part = path.clone().into_os_string();
        part.push(".part");
        let part = PathBuf::from(part);

        let written = async {
            let mut f = tokio::fs::File::create(&part).await?;
            let mut written = 0u64;
            while let Some(chunk) = body.try_next().await? {
                f.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            f.sync_all().await?;
            Ok::<_, BlobError>(written)
        }
        .await;

        match written {
            Ok(n) => {
                if let Err(e) = tokio::fs::rename(&part, &path).await {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(e.into());
                }
                Ok(n)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                Err(e)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process blob store with switchable failures.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Bytes>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Bytes>> {
        self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait(?Send)]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, mut body: ByteStream<'_>) -> Result<u64, BlobError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("put disabled".into()));
        }
        let mut data = Vec::new();
        while let Some(chunk) = body.try_next().await? {
            data.extend_from_slice(&chunk);
        }
        let n = data.len() as u64;
        self.lock().insert(key.to_string(), Bytes::from(data));
        Ok(n)
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(BlobError::Unavailable("delete disabled".into()));
        }
        self.lock().remove(key);
        Ok(())
    }
}

/// Wraps an upload stream so it fails once more than `limit` bytes have passed.
pub fn limit_stream<'a>(body: ByteStream<'a>, limit: usize) -> ByteStream<'a> {
    let mut seen = 0usize;
    Box::pin(body.and_then(move |chunk| {
        seen = seen.saturating_add(chunk.len());
        let res = if seen > limit { Err(BlobError::TooLarge(limit)) } else { Ok(chunk) };
        futures_util::future::ready(res)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn body(chunks: &[&'static [u8]]) -> ByteStream<'static> {
        let items: Vec<Result<Bytes, BlobError>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(*c))).collect();
        Box::pin(stream::iter(items))
    }

    #[actix_web::test]
    async fn local_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let key = "user_1:1700000000000000000:report.pdf";

        let n = store.put(key, body(&[b"hello ", b"world"])).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"hello world"));

        store.delete(key).await.unwrap();
        assert!(matches!(store.get(key).await, Err(BlobError::NotFound(_))));
        // second delete of a missing key is fine
        store.delete(key).await.unwrap();
    }

    #[actix_web::test]
    async fn local_keys_with_path_characters_stay_in_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let key = "u1:42:../../etc/passwd";
        store.put(key, body(&[b"x"])).await.unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"x"));
    }

    #[actix_web::test]
    async fn long_keys_fit_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let long_name = format!("u1:1700000000000000000:{}", "a".repeat(240));
        let long_owner = format!("{}:1700000000000000000:a.txt", "o".repeat(260));

        store.put(&long_name, body(&[b"name"])).await.unwrap();
        store.put(&long_owner, body(&[b"owner"])).await.unwrap();
        assert_eq!(store.get(&long_name).await.unwrap(), Bytes::from_static(b"name"));
        assert_eq!(store.get(&long_owner).await.unwrap(), Bytes::from_static(b"owner"));

        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name();
            assert!(name.len() + ".part".len() <= 255, "{name:?}");
        }
    }

    #[actix_web::test]
    async fn keys_sharing_a_long_prefix_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let owner = "o".repeat(300);
        let a = format!("{owner}:1:a.txt");
        let b = format!("{owner}:2:a.txt");

        store.put(&a, body(&[b"first"])).await.unwrap();
        store.put(&b, body(&[b"second"])).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
        assert_eq!(store.get(&a).await.unwrap(), Bytes::from_static(b"first"));

        store.delete(&b).await.unwrap();
        assert_eq!(store.get(&a).await.unwrap(), Bytes::from_static(b"first"));
    }

    #[test]
    fn sanitized_lookalikes_get_distinct_names() {
        assert_ne!(blob_file_name("u:1:a/b"), blob_file_name("u:1:a_b"));
        assert_eq!(blob_file_name("u:1:a"), blob_file_name("u:1:a"));
        let wide = blob_file_name(&format!("u:1:{}", "\u{1F600}".repeat(100)));
        assert!(wide.len() <= NAME_PREFIX_BYTES + 1 + 64, "{}", wide.len());
    }

    #[actix_web::test]
    async fn failed_put_leaves_no_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        let limited = limit_stream(body(&[b"12345", b"67890"]), 8);
        let err = store.put("k", limited).await.unwrap_err();
        assert!(matches!(err, BlobError::TooLarge(8)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn limit_allows_exact_size() {
        let store = MemoryBlobStore::new();
        let n = store.put("k", limit_stream(body(&[b"1234", b"5678"]), 8)).await.unwrap();
        assert_eq!(n, 8);
    }

    #[actix_web::test]
    async fn memory_failure_injection() {
        let store = MemoryBlobStore::new();
        store.fail_puts(true);
        assert!(store.put("k", body(&[b"x"])).await.is_err());
        assert!(store.is_empty());
        store.fail_puts(false);
        store.put("k", body(&[b"x"])).await.unwrap();
        store.fail_deletes(true);
        assert!(store.delete("k").await.is_err());
        assert!(store.contains("k"));
    }
}
