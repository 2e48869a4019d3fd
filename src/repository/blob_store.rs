//! Filesystem blob store for the embedded backend
//!
//! Objects land at `{root}/{bucket}/{path}`.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use super::traits::{BlobStore, UploadOptions};
use crate::domain::{DomainError, DomainResult};

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `bucket/path` under the root, refusing anything that escapes it
    fn resolve(&self, bucket: &str, path: &str) -> DomainResult<PathBuf> {
        let relative = Path::new(bucket).join(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if bucket.is_empty() || path.is_empty() || escapes {
            return Err(DomainError::InvalidInput(format!(
                "Invalid object path: {}/{}",
                bucket, path
            )));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(e: std::io::Error, target: &Path) -> DomainError {
    DomainError::Backend(format!("{}: {}", target.display(), e))
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        blob: Vec<u8>,
        options: UploadOptions,
    ) -> DomainResult<String> {
        let target = self.resolve(bucket, path)?;

        if !options.upsert && tokio::fs::try_exists(&target).await.map_err(|e| io_error(e, &target))? {
            return Err(DomainError::Conflict(format!("Object already exists: {}/{}", bucket, path)));
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(e, parent))?;
        }
        tokio::fs::write(&target, &blob)
            .await
            .map_err(|e| io_error(e, &target))?;

        log::debug!("Stored {} bytes at {}", blob.len(), target.display());
        Ok(format!("{}/{}", bucket, path))
    }
}
