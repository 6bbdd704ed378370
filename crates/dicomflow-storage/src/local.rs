use crate::traits::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Files under a single root directory, one file per key.
///
/// Keys are relative `/`-separated paths; intermediate directories are created
/// on write.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub async fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::ConfigError(format!("Cannot create {}: {}", root.display(), e))
        })?;
        let root = fs::canonicalize(&root).await.map_err(|e| {
            StorageError::ConfigError(format!("Cannot resolve {}: {}", root.display(), e))
        })?;
        Ok(LocalStorage { root })
    }

    pub fn base_path(&self) -> &Path {
        &self.root
    }

    /// Only plain path segments are allowed, so the result always stays under
    /// the root.
    fn resolve(&self, key: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidKey(format!(
                "Storage key {:?} must be a relative path without '..'",
                key
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Truncating open of `path`, creating missing parent directories.
    async fn create(path: &Path) -> StorageResult<File> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        File::create(path)
            .await
            .map_err(|e| write_failed("create", path, e))
    }
}

fn write_failed(step: &str, path: &Path, e: std::io::Error) -> StorageError {
    StorageError::UploadFailed(format!("Cannot {} {}: {}", step, path.display(), e))
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, storage_key: &str, data: Bytes) -> StorageResult<()> {
        let path = self.resolve(storage_key)?;
        let mut file = Self::create(&path).await?;
        file.write_all(&data)
            .await
            .map_err(|e| write_failed("write", &path, e))?;
        file.sync_all()
            .await
            .map_err(|e| write_failed("sync", &path, e))?;

        tracing::debug!(key = storage_key, bytes = data.len(), "Stored object");
        Ok(())
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.resolve(storage_key)?;
        fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound(storage_key.to_string()),
            _ => StorageError::DownloadFailed(format!("Cannot read {}: {}", path.display(), e)),
        })
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.resolve(storage_key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Cannot remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.resolve(storage_key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn concat(&self, parts: &[String], dest_key: &str) -> StorageResult<u64> {
        let dest_path = self.resolve(dest_key)?;
        let sources = parts
            .iter()
            .map(|key| self.resolve(key).map(|path| (key, path)))
            .collect::<StorageResult<Vec<_>>>()?;

        let started = Instant::now();
        let mut dest = Self::create(&dest_path).await?;
        let mut written = 0u64;
        for (key, path) in &sources {
            let mut part = File::open(path).await.map_err(|e| match e.kind() {
                ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
                _ => StorageError::DownloadFailed(format!("Cannot open {}: {}", path.display(), e)),
            })?;
            written += tokio::io::copy(&mut part, &mut dest)
                .await
                .map_err(|e| write_failed("append to", &dest_path, e))?;
        }
        dest.sync_all()
            .await
            .map_err(|e| write_failed("sync", &dest_path, e))?;

        tracing::info!(
            key = dest_key,
            parts = parts.len(),
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Assembled file from chunks"
        );
        Ok(written)
    }
}
