//! Artifact storage
//!
//! A sink is a flat key/value blob store: `put` always overwrites, `get`
//! reads back what was last written.

use async_trait::async_trait;

pub mod azure;
pub mod memory;
pub mod shared_key;

pub use azure::{AzureBlobSink, StorageAuth, StorageConnection};
pub use memory::MemorySink;

pub const DEFAULT_CONTAINER: &str = "weatherdata";

#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Write `content` under `container/blob_name`, replacing any existing blob
    async fn put(&self, container: &str, blob_name: &str, content: &str) -> crate::Result<()>;

    /// Read a blob back; `None` when it does not exist
    async fn get(&self, container: &str, blob_name: &str) -> crate::Result<Option<String>>;
}
