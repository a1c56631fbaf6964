use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tracing::debug;

use crate::error::DownloadError;

/// Moves completed downloads out of the shared downloads folder.
#[async_trait]
pub trait Relocator: Send + Sync {
    /// Create a fresh directory no other download will use.
    async fn prepare_unique_target_folder(&self) -> Result<PathBuf, DownloadError>;

    async fn move_file(&self, source: &Path, target: &Path) -> Result<(), DownloadError>;
}

static FOLDER_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Relocates into `<root>/<millis>_<counter>/` on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsRelocator {
    root: PathBuf,
}

impl FsRelocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Relocator for FsRelocator {
    async fn prepare_unique_target_folder(&self) -> Result<PathBuf, DownloadError> {
        let name = format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            FOLDER_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let folder = self.root.join(name);
        fs::create_dir_all(&folder).await?;
        Ok(folder)
    }

    async fn move_file(&self, source: &Path, target: &Path) -> Result<(), DownloadError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::rename(source, target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() != io::ErrorKind::NotFound => {
                // Cross-device moves fail to rename.
                debug!(source = %source.display(), %err, "rename failed, copying instead");
                fs::copy(source, target).await?;
                fs::remove_file(source).await?;
                Ok(())
            }
            Err(err) => Err(DownloadError::Io(format!(
                "{}: {err}",
                source.display()
            ))),
        }
    }
}
