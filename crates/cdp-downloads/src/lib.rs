//! Browser downloads coordinated over the Chrome DevTools protocol.
//!
//! A [`DownloadSession`] arms `Browser.downloadWillBegin` / `Browser.downloadProgress`
//! listeners, performs a [`DownloadAction`], waits for a completed download accepted by a
//! [`FileFilter`] and moves it into a folder of its own.

pub mod abort;
pub mod action;
pub mod config;
pub mod error;
pub mod filter;
pub mod folder;
pub mod listeners;
pub mod metrics;
pub mod registry;
pub mod relocation;
pub mod session;
pub mod stall;

pub use abort::AbortSignal;
pub use action::{ClickAction, DownloadAction, FnAction};
pub use config::{DownloadConfig, MIN_POLLING_INTERVAL};
pub use error::DownloadError;
pub use filter::{DownloadedFile, FileFilter, FileFilterExt, FileFilters};
pub use folder::{DownloadsFolder, DownloadsFolderProvider, StaticDownloadsFolder};
pub use listeners::{ProgressListener, WillBeginListener};
pub use metrics::DownloadMetricsSnapshot;
pub use registry::{DownloadRecord, DownloadSet};
pub use relocation::{FsRelocator, Relocator};
pub use session::{DownloadSession, ListenerGuard, SessionPhase};
pub use stall::StallDetector;
