use std::fmt;
use std::path::{Path, PathBuf};

/// Directory the browser writes downloads into.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadsFolder {
    path: PathBuf,
}

impl DownloadsFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

impl fmt::Display for DownloadsFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Resolves the downloads folder of the current browser, if one is configured.
pub trait DownloadsFolderProvider: Send + Sync {
    fn current_downloads_folder(&self) -> Option<DownloadsFolder>;
}

/// Provider returning a fixed folder (or none).
#[derive(Clone, Debug, Default)]
pub struct StaticDownloadsFolder(Option<DownloadsFolder>);

impl StaticDownloadsFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Some(DownloadsFolder::new(path)))
    }

    pub fn unconfigured() -> Self {
        Self(None)
    }

    pub fn from_path(path: Option<PathBuf>) -> Self {
        Self(path.map(DownloadsFolder::new))
    }
}

impl DownloadsFolderProvider for StaticDownloadsFolder {
    fn current_downloads_folder(&self) -> Option<DownloadsFolder> {
        self.0.clone()
    }
}
