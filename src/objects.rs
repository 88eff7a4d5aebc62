//! Object storage collaborator for profile photos.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

pub type Objects = Arc<dyn ObjectStore>;

#[derive(Debug, Error)]
pub enum ObjectError {
    #[error("invalid object path {0:?}")]
    InvalidPath(String),

    #[error("object storage: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` at `path`, replacing what was there, and returns a URL
    /// that changes with every upload.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, ObjectError>;

    fn url(&self, path: &str) -> Result<String, ObjectError>;
}

pub fn profile_photo_path(uid: &str) -> String {
    format!("profiles/{uid}/{uid}.jpg")
}

/// Objects as files under `root`, published under `{public_url}/o/`.
pub struct FsObjectStore {
    root: PathBuf,
    public_base: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/o", public_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ObjectError> {
        let relative = Path::new(path);
        let plain = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(ObjectError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<String, ObjectError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }

        let staging = target.with_extension("upload");
        fs::write(&staging, &bytes).await?;
        fs::rename(&staging, &target).await?;
        debug!("stored {} bytes at {path}", bytes.len());

        Ok(format!("{}?v={}", self.url(path)?, Utc::now().timestamp_micros()))
    }

    fn url(&self, path: &str) -> Result<String, ObjectError> {
        self.resolve(path)?;
        Ok(format!("{}/{path}", self.public_base))
    }
}
