use crate::error::{ZarrError, ZarrResult};
use async_trait::async_trait;
use bytes::Bytes;
use object_store::ObjectStoreExt;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

// ---------------------------------------------------------------------------
// Byte ranges
// ---------------------------------------------------------------------------

/// A byte range within a stored object. `Suffix` addresses the trailing
/// `length` bytes without knowing the object's size (shard indexes at the
/// end of a shard are read this way).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Bounded { offset: u64, length: u64 },
    Suffix { length: u64 },
}

impl ByteRange {
    /// Resolve to `[start, end)` given the total object size.
    pub fn resolve(&self, total: u64) -> (u64, u64) {
        match *self {
            ByteRange::Bounded { offset, length } => {
                let start = offset.min(total);
                (start, (offset.saturating_add(length)).min(total))
            }
            ByteRange::Suffix { length } => (total.saturating_sub(length), total),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageBackend trait
// ---------------------------------------------------------------------------

/// Async key-value storage abstraction.
///
/// Implementations can target local filesystem, S3, GCS, Azure, or in-memory
/// stores. A missing key is `Ok(None)`, never an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Fetch the full contents at `path`.
    async fn get(&self, path: &str) -> ZarrResult<Option<Bytes>>;

    /// Fetch a byte range of the contents at `path`.
    async fn get_range(&self, path: &str, range: ByteRange) -> ZarrResult<Option<Bytes>>;

    /// Overwrite the contents at `path` wholesale.
    async fn put(&self, path: &str, data: Bytes) -> ZarrResult<()>;

    /// Delete the contents at `path`. Deleting a missing key is not an error.
    async fn delete(&self, path: &str) -> ZarrResult<()>;

    /// List immediate children under `prefix`.
    async fn list(&self, prefix: &str) -> ZarrResult<Vec<String>>;

    /// Join a base path with a relative segment.
    fn join(&self, base: &str, segment: &str) -> String;
}

// ---------------------------------------------------------------------------
// LocalBackend  (tokio::fs)
// ---------------------------------------------------------------------------

/// Simple local-filesystem backend using `tokio::fs`.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    async fn get(&self, path: &str) -> ZarrResult<Option<Bytes>> {
        let full = self.resolve(path);
        match tokio::fs::read(&full).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ZarrError::Storage(format!(
                "Failed to read {}: {e}",
                full.display()
            ))),
        }
    }

    async fn get_range(&self, path: &str, range: ByteRange) -> ZarrResult<Option<Bytes>> {
        let full = self.resolve(path);
        let mut file = match tokio::fs::File::open(&full).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ZarrError::Storage(format!(
                    "Failed to open {}: {e}",
                    full.display()
                )));
            }
        };
        let total = file
            .metadata()
            .await
            .map_err(|e| ZarrError::Storage(format!("Failed to stat {}: {e}", full.display())))?
            .len();
        let (start, end) = range.resolve(total);
        let mut buf = vec![0u8; (end - start) as usize];
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| ZarrError::Storage(format!("Failed to seek {}: {e}", full.display())))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| ZarrError::Storage(format!("Failed to read {}: {e}", full.display())))?;
        Ok(Some(Bytes::from(buf)))
    }

    async fn put(&self, path: &str, data: Bytes) -> ZarrResult<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ZarrError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }
        tokio::fs::write(&full, &data)
            .await
            .map_err(|e| ZarrError::Storage(format!("Failed to write {}: {e}", full.display())))
    }

    async fn delete(&self, path: &str) -> ZarrResult<()> {
        let full = self.resolve(path);
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ZarrError::Storage(format!(
                "Failed to delete {}: {e}",
                full.display()
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> ZarrResult<Vec<String>> {
        let dir = self.resolve(prefix);
        let mut entries = Vec::new();
        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| ZarrError::Storage(format!("Failed to list {}: {e}", dir.display())))?;
        while let Some(entry) = reader.next_entry().await.map_err(|e| {
            ZarrError::Storage(format!("Failed to read entry in {}: {e}", dir.display()))
        })? {
            if let Some(name) = entry.file_name().to_str() {
                entries.push(name.to_string());
            }
        }
        Ok(entries)
    }

    fn join(&self, base: &str, segment: &str) -> String {
        let p = Path::new(base).join(segment);
        p.to_string_lossy().into_owned()
    }
}

// ---------------------------------------------------------------------------
// ObjectStoreBackend  (wraps object_store crate)
// ---------------------------------------------------------------------------

/// Backend that wraps any [`object_store::ObjectStore`] implementation.
pub struct ObjectStoreBackend {
    store: Box<dyn object_store::ObjectStore>,
    prefix: String,
}

impl ObjectStoreBackend {
    pub fn new(store: Box<dyn object_store::ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn full_path(&self, path: &str) -> object_store::path::Path {
        if self.prefix.is_empty() {
            object_store::path::Path::from(path)
        } else {
            object_store::path::Path::from(format!("{}/{}", self.prefix, path))
        }
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> ZarrResult<Option<Bytes>> {
        let location = self.full_path(path);
        match self.store.get(&location).await {
            Ok(result) => {
                let data = result.bytes().await.map_err(|e| {
                    ZarrError::Storage(format!("Failed to read bytes from {path}: {e}"))
                })?;
                Ok(Some(data))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(ZarrError::Storage(format!(
                "Object store error for {path}: {e}"
            ))),
        }
    }

    async fn get_range(&self, path: &str, range: ByteRange) -> ZarrResult<Option<Bytes>> {
        let location = self.full_path(path);
        let get_range = match range {
            ByteRange::Bounded { offset, length } => {
                object_store::GetRange::Bounded(offset..offset + length)
            }
            ByteRange::Suffix { length } => object_store::GetRange::Suffix(length),
        };
        let options = object_store::GetOptions {
            range: Some(get_range),
            ..Default::default()
        };
        match self.store.get_opts(&location, options).await {
            Ok(result) => {
                let data = result.bytes().await.map_err(|e| {
                    ZarrError::Storage(format!("Failed to read bytes from {path}: {e}"))
                })?;
                Ok(Some(data))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(ZarrError::Storage(format!(
                "Object store range error for {path}: {e}"
            ))),
        }
    }

    async fn put(&self, path: &str, data: Bytes) -> ZarrResult<()> {
        let location = self.full_path(path);
        self.store
            .put(&location, data.into())
            .await
            .map(|_| ())
            .map_err(|e| ZarrError::Storage(format!("Object store put error for {path}: {e}")))
    }

    async fn delete(&self, path: &str) -> ZarrResult<()> {
        let location = self.full_path(path);
        match self.store.delete(&location).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(ZarrError::Storage(format!(
                "Object store delete error for {path}: {e}"
            ))),
        }
    }

    async fn list(&self, prefix: &str) -> ZarrResult<Vec<String>> {
        use futures::TryStreamExt;
        let location = self.full_path(prefix);
        let mut entries = Vec::new();
        let mut stream = self.store.list(Some(&location));
        while let Some(meta) = stream.try_next().await.map_err(|e| {
            ZarrError::Storage(format!("Object store list error for {prefix}: {e}"))
        })? {
            entries.push(meta.location.to_string());
        }
        Ok(entries)
    }

    fn join(&self, base: &str, segment: &str) -> String {
        if base.is_empty() {
            segment.to_string()
        } else {
            format!("{base}/{segment}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> ObjectStoreBackend {
        ObjectStoreBackend::new(Box::new(object_store::memory::InMemory::new()), "")
    }

    #[tokio::test]
    async fn absent_key_is_none_not_error() {
        let store = memory_backend();
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(
            store
                .get_range("missing", ByteRange::Suffix { length: 4 })
                .await
                .unwrap()
                .is_none()
        );
        store.delete("missing").await.unwrap();
    }

    #[tokio::test]
    async fn put_get_range_round_trip() {
        let store = memory_backend();
        store
            .put("key", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();
        let mid = store
            .get_range(
                "key",
                ByteRange::Bounded {
                    offset: 2,
                    length: 4,
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&mid[..], b"2345");
        let tail = store
            .get_range("key", ByteRange::Suffix { length: 3 })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&tail[..], b"789");
    }
}
