use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::RwLock;

use tokio::fs;
use tracing::{debug, error, info};

use crate::{UpstreamError, UpstreamResult};

/// Boxed future type for message retrieval, enabling object safety.
pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = UpstreamResult<Vec<u8>>> + Send + 'a>>;

/// Trait for raw message stores.
///
/// Implementations of this trait provide different storage backends,
/// such as filesystem, memory, object storage, etc. A message is located by
/// a configured location prefix followed by its identifier.
pub trait MessageStore: Send + Sync {
    /// Retrieves the raw bytes of the message stored as `{prefix}{message_id}`.
    fn get<'a>(&'a self, prefix: &'a str, message_id: &'a str) -> FetchFuture<'a>;

    /// Returns the name of this store.
    fn name(&self) -> &str;
}

/// Filesystem-based message store.
///
/// Reads raw messages from `{base_path}/{prefix}{message_id}`, a prefix
/// such as `nekura-org/` maps to a sub-directory.
#[derive(Debug, Clone)]
pub struct FileMessageStore {
    /// Base path holding the stored messages.
    base_path: PathBuf,
}

impl FileMessageStore {
    /// Creates a new [`FileMessageStore`] rooted at `base_path`.
    pub fn new(base_path: PathBuf) -> Self {
        info!(path = %base_path.display(), "File message store initialized");
        Self { base_path }
    }

    /// Returns the path of a stored message, refusing identifiers that
    /// could escape the location prefix.
    fn message_path(&self, prefix: &str, message_id: &str) -> UpstreamResult<PathBuf> {
        if message_id.is_empty()
            || message_id.contains(['/', '\\'])
            || message_id == "."
            || message_id == ".."
            || prefix.split(['/', '\\']).any(|part| part == "..")
        {
            return Err(UpstreamError::Storage(format!(
                "Invalid message location: {prefix}{message_id}"
            )));
        }
        Ok(self.base_path.join(format!("{prefix}{message_id}")))
    }
}

impl MessageStore for FileMessageStore {
    fn get<'a>(&'a self, prefix: &'a str, message_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let path = self.message_path(prefix, message_id)?;
            debug!(path = %path.display(), "Loading message from filesystem");
            fs::read(&path).await.map_err(|e| {
                error!(path = %path.display(), error = %e, "Failed to load message");
                if e.kind() == io::ErrorKind::NotFound {
                    UpstreamError::Storage(format!("Message not found: {prefix}{message_id}"))
                } else {
                    UpstreamError::Storage(format!("I/O error: {e}"))
                }
            })
        })
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// In-memory message store.
///
/// Stores raw messages in memory keyed by their full location.
/// Useful for testing and development.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryMessageStore {
    /// Creates a new empty [`MemoryMessageStore`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `raw` under `{prefix}{message_id}`.
    pub fn insert(&self, prefix: &str, message_id: &str, raw: &[u8]) {
        if let Ok(mut messages) = self.messages.write() {
            messages.insert(format!("{prefix}{message_id}"), raw.to_vec());
        }
    }

    /// Returns the number of stored messages.
    pub fn message_count(&self) -> usize {
        self.messages.read().map(|m| m.len()).unwrap_or(0)
    }
}

impl MessageStore for MemoryMessageStore {
    fn get<'a>(&'a self, prefix: &'a str, message_id: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let location = format!("{prefix}{message_id}");
            let messages = self
                .messages
                .read()
                .map_err(|e| UpstreamError::Storage(e.to_string()))?;
            messages
                .get(&location)
                .cloned()
                .ok_or_else(|| UpstreamError::Storage(format!("Message not found: {location}")))
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_file_store_get() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("nekura-org")).unwrap();
        std::fs::write(
            temp_dir.path().join("nekura-org/abc123"),
            b"From: bob@y.com\r\n\r\nBody",
        )
        .unwrap();
        let store = FileMessageStore::new(temp_dir.path().to_path_buf());

        let raw = store.get("nekura-org/", "abc123").await.unwrap();

        assert_eq!(raw, b"From: bob@y.com\r\n\r\nBody");
    }

    #[tokio::test]
    async fn test_file_store_empty_prefix() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("abc123"), b"Body").unwrap();
        let store = FileMessageStore::new(temp_dir.path().to_path_buf());

        assert_eq!(store.get("", "abc123").await.unwrap(), b"Body");
    }

    #[tokio::test]
    async fn test_file_store_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMessageStore::new(temp_dir.path().to_path_buf());

        let result = store.get("nekura-org/", "missing").await;

        assert_eq!(
            result,
            Err(UpstreamError::Storage(
                "Message not found: nekura-org/missing".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_file_store_rejects_traversal() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMessageStore::new(temp_dir.path().to_path_buf());

        assert!(store.get("", "../etc/passwd").await.is_err());
        assert!(store.get("", "..").await.is_err());
        assert!(store.get("../", "abc").await.is_err());
        assert!(store.get("", "").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryMessageStore::new();
        store.insert("prefix/", "id-1", b"raw bytes");

        assert_eq!(store.message_count(), 1);
        assert_eq!(store.get("prefix/", "id-1").await.unwrap(), b"raw bytes");
        assert!(store.get("other/", "id-1").await.is_err());
    }

    #[test]
    fn test_store_names() {
        assert_eq!(FileMessageStore::new(PathBuf::from("mailstore")).name(), "file");
        assert_eq!(MemoryMessageStore::new().name(), "memory");
    }
}
