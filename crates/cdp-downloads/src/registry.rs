//! Registry of downloads announced by the browser during one session.
//!
//! Written by listener callbacks on the dispatcher task, read by the waiting poll loop.
//! Each record is updated under its shard lock, so readers never see a half-applied event.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::filter::{DownloadedFile, FileFilter};
use crate::folder::DownloadsFolder;

/// One download the browser announced via `downloadWillBegin`.
#[derive(Clone, Debug)]
pub struct DownloadRecord {
    pub id: String,
    pub file_name: String,
    pub url: Option<String>,
    pub last_activity_at: Instant,
    pub completed: bool,
}

impl DownloadRecord {
    fn touch(&mut self) {
        // Never moves backwards.
        self.last_activity_at = self.last_activity_at.max(Instant::now());
    }
}

pub struct DownloadSet {
    folder: DownloadsFolder,
    downloads: DashMap<String, DownloadRecord>,
}

impl DownloadSet {
    pub fn new(folder: DownloadsFolder) -> Self {
        Self {
            folder,
            downloads: DashMap::new(),
        }
    }

    pub fn folder(&self) -> &DownloadsFolder {
        &self.folder
    }

    pub fn add_file(&self, id: &str, file_name: &str) -> bool {
        self.add_file_with_url(id, file_name, None)
    }

    /// Track a new download. A repeated id keeps the first record untouched.
    pub fn add_file_with_url(&self, id: &str, file_name: &str, url: Option<&str>) -> bool {
        match self.downloads.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(DownloadRecord {
                    id: id.to_string(),
                    file_name: file_name.to_string(),
                    url: url.map(str::to_string),
                    last_activity_at: Instant::now(),
                    completed: false,
                });
                true
            }
        }
    }

    /// Refresh the activity timestamp. Returns `false` for an unknown id.
    pub fn mark_in_progress(&self, id: &str) -> bool {
        match self.downloads.get_mut(id) {
            Some(mut record) => {
                record.touch();
                true
            }
            None => false,
        }
    }

    /// Flag the download as finished. Completion is never undone.
    pub fn mark_completed(&self, id: &str) -> bool {
        match self.downloads.get_mut(id) {
            Some(mut record) => {
                record.touch();
                record.completed = true;
                true
            }
            None => false,
        }
    }

    /// First completed download whose target path passes `filter`.
    pub fn find_matching(&self, filter: &dyn FileFilter) -> Option<DownloadRecord> {
        self.downloads
            .iter()
            .filter(|entry| entry.completed)
            .find(|entry| filter.matches(&DownloadedFile::new(self.file_of(entry.value()))))
            .map(|entry| entry.value().clone())
    }

    /// Latest activity across all records, or `fallback` when nothing is tracked yet.
    pub fn last_activity(&self, fallback: Instant) -> Instant {
        self.downloads
            .iter()
            .map(|entry| entry.last_activity_at)
            .max()
            .unwrap_or(fallback)
    }

    pub fn file_of(&self, record: &DownloadRecord) -> PathBuf {
        self.folder.file(&record.file_name)
    }

    /// File view of `record` carrying everything the browser told us about it.
    pub fn downloaded_file(&self, record: &DownloadRecord) -> DownloadedFile {
        let mut headers = HashMap::new();
        headers.insert("guid".to_string(), record.id.clone());
        headers.insert("suggested-filename".to_string(), record.file_name.clone());
        if let Some(url) = &record.url {
            headers.insert("url".to_string(), url.clone());
        }
        DownloadedFile::with_headers(self.file_of(record), headers)
    }

    pub fn len(&self) -> usize {
        self.downloads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.downloads.is_empty()
    }

    pub fn snapshot(&self) -> Vec<DownloadRecord> {
        self.downloads.iter().map(|entry| entry.value().clone()).collect()
    }
}
