pub mod blob;
pub mod metadata;

pub use blob::{BlobStore, ByteStream, LocalBlobStore, MemoryBlobStore};
pub use metadata::{FileRepository, SqliteFileRepository};
