//! File filters used to pick the wanted download among concurrent ones.
//!
//! Descriptions start with a space (or are empty) so they read naturally inside
//! "Failed to download file{description} in N ms".

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

/// A downloaded (or about to be downloaded) file plus whatever metadata is known about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadedFile {
    path: PathBuf,
    headers: HashMap<String, String>,
}

impl DownloadedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_headers(path: impl Into<PathBuf>, headers: HashMap<String, String>) -> Self {
        Self {
            path: path.into(),
            headers,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Pure predicate over downloaded files. Must be cheap and callable repeatedly.
pub trait FileFilter: Send + Sync {
    fn matches(&self, file: &DownloadedFile) -> bool;

    fn description(&self) -> String;
}

impl<F: FileFilter + ?Sized> FileFilter for Box<F> {
    fn matches(&self, file: &DownloadedFile) -> bool {
        (**self).matches(file)
    }

    fn description(&self) -> String {
        (**self).description()
    }
}

/// Accepts everything.
#[derive(Clone, Debug, Default)]
pub struct AnyFile;

impl FileFilter for AnyFile {
    fn matches(&self, _file: &DownloadedFile) -> bool {
        true
    }

    fn description(&self) -> String {
        String::new()
    }
}

#[derive(Clone, Debug)]
pub struct NameFilter {
    name: String,
}

impl FileFilter for NameFilter {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.name() == self.name
    }

    fn description(&self) -> String {
        format!(" with name \"{}\"", self.name)
    }
}

#[derive(Clone, Debug)]
pub struct NameMatching {
    pattern: Regex,
}

impl FileFilter for NameMatching {
    fn matches(&self, file: &DownloadedFile) -> bool {
        self.pattern.is_match(&file.name())
    }

    fn description(&self) -> String {
        format!(" with name matching \"{}\"", self.pattern.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct NameContaining {
    part: String,
}

impl FileFilter for NameContaining {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.name().contains(&self.part)
    }

    fn description(&self) -> String {
        format!(" with name containing \"{}\"", self.part)
    }
}

#[derive(Clone, Debug)]
pub struct ExtensionFilter {
    extension: String,
}

impl FileFilter for ExtensionFilter {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    fn description(&self) -> String {
        format!(" with extension \"{}\"", self.extension)
    }
}

/// Both filters must accept.
pub struct And<A, B> {
    left: A,
    right: B,
}

impl<A: FileFilter, B: FileFilter> FileFilter for And<A, B> {
    fn matches(&self, file: &DownloadedFile) -> bool {
        self.left.matches(file) && self.right.matches(file)
    }

    fn description(&self) -> String {
        format!("{} and{}", self.left.description(), self.right.description())
    }
}

pub trait FileFilterExt: FileFilter + Sized {
    fn and<B: FileFilter>(self, other: B) -> And<Self, B> {
        And {
            left: self,
            right: other,
        }
    }
}

impl<F: FileFilter> FileFilterExt for F {}

/// Constructors for the built-in filters.
pub struct FileFilters;

impl FileFilters {
    pub fn none() -> AnyFile {
        AnyFile
    }

    pub fn with_name(name: impl Into<String>) -> NameFilter {
        NameFilter { name: name.into() }
    }

    pub fn with_name_matching(pattern: &str) -> Result<NameMatching, regex::Error> {
        Ok(NameMatching {
            pattern: Regex::new(pattern)?,
        })
    }

    pub fn with_name_containing(part: impl Into<String>) -> NameContaining {
        NameContaining { part: part.into() }
    }

    pub fn with_extension(extension: impl Into<String>) -> ExtensionFilter {
        let extension = extension.into();
        ExtensionFilter {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }
}
