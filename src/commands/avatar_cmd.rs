//! Avatar Commands

use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use super::{Gateway, GatewayStatus};
use crate::domain::validation::require_id;
use crate::domain::{DomainError, DomainResult};
use crate::repository::{BlobStore, UploadOptions};

/// Avatar object path: `{user_id}/avatar.{ext}`, extension lowercased
pub fn avatar_path(user_id: &str, file_name: &str) -> DomainResult<String> {
    require_id(user_id, "user")?;
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| DomainError::InvalidInput(format!("File {} has no extension", file_name)))?;
    Ok(format!("{}/avatar.{}", user_id, ext.to_lowercase()))
}

pub struct AvatarCommands {
    blobs: Arc<dyn BlobStore>,
    bucket: String,
    gateway: Gateway,
}

impl AvatarCommands {
    pub fn new(blobs: Arc<dyn BlobStore>, bucket: impl Into<String>) -> Self {
        Self {
            blobs,
            bucket: bucket.into(),
            gateway: Gateway::new("avatars"),
        }
    }

    pub fn status(&self) -> GatewayStatus {
        self.gateway.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<GatewayStatus> {
        self.gateway.subscribe()
    }

    /// Upload (or replace) a user's avatar, returning the stored key
    pub async fn upload(&self, user_id: &str, file_name: &str, bytes: Vec<u8>) -> DomainResult<String> {
        self.gateway
            .execute("upload", async move {
                let path = avatar_path(user_id, file_name)?;
                if bytes.is_empty() {
                    return Err(DomainError::InvalidInput("Avatar file is empty".into()));
                }
                let options = UploadOptions {
                    cache_control: "3600".to_string(),
                    upsert: true,
                };
                self.blobs.upload(&self.bucket, &path, bytes, options).await
            })
            .await
    }
}
