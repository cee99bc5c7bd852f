use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::BlobSink;

/// In-process blob store for dry runs and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    blobs: RwLock<HashMap<(String, String), String>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently held
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Sorted blob names in `container`
    pub async fn blob_names(&self, container: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .blobs
            .read()
            .await
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl BlobSink for MemorySink {
    async fn put(&self, container: &str, blob_name: &str, content: &str) -> crate::Result<()> {
        self.blobs
            .write()
            .await
            .insert((container.to_string(), blob_name.to_string()), content.to_string());
        Ok(())
    }

    async fn get(&self, container: &str, blob_name: &str) -> crate::Result<Option<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .get(&(container.to_string(), blob_name.to_string()))
            .cloned())
    }
}
