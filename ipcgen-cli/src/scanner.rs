//! Source file scanner for discovering TypeScript API modules.
//!
//! This module recursively scans a directory for `.ts`, `.tsx`, `.mts` and
//! `.cts` files (declaration files excluded), respecting `.gitignore`
//! patterns, an optional glob filter and a list of excluded directories.
//! Generated output directories are excluded so a build never reads its own
//! artifacts.

use crate::error::ScanError;
use ignore::WalkBuilder;
use ipcgen::resolver::paths::is_source_file;
use std::path::{Path, PathBuf};

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    /// Absolute path to the file.
    pub path: PathBuf,

    /// Path relative to the scan root.
    pub relative_path: PathBuf,
}

/// Scanner for discovering TypeScript source files.
#[derive(Debug, Clone)]
pub struct SourceScanner {
    /// Root directory to scan.
    root: PathBuf,

    /// Whether to respect .gitignore files.
    respect_gitignore: bool,

    /// Optional glob filter pattern, matched against the relative path.
    filter: Option<glob::Pattern>,

    /// Directories whose contents are never returned.
    excluded: Vec<PathBuf>,
}

impl SourceScanner {
    /// Create a new scanner for the given root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            respect_gitignore: true,
            filter: None,
            excluded: Vec::new(),
        }
    }

    /// Set whether to respect .gitignore files.
    pub fn with_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    /// Set a glob filter pattern for files.
    ///
    /// Only files matching the pattern will be included.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self, ScanError> {
        let glob_pattern = glob::Pattern::new(pattern)
            .map_err(|e| ScanError::invalid_pattern(pattern, e.to_string()))?;
        self.filter = Some(glob_pattern);
        Ok(self)
    }

    /// Exclude files under the given directories.
    pub fn with_excluded<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.excluded.extend(dirs.into_iter().map(Into::into));
        self
    }

    /// Scan the directory and return every accepted source file, sorted by
    /// path. An empty result is not an error.
    pub fn scan(&self) -> Result<Vec<SourceFile>, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::directory_not_found(self.root.clone()));
        }

        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .hidden(false)
            .build();

        for entry in walker {
            let entry = entry?;
            let path = entry.path();

            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }

            if !self.accepts(path) {
                continue;
            }

            files.push(SourceFile {
                path: path.to_path_buf(),
                relative_path: self.relative_path(path),
            });
        }

        files.sort();
        Ok(files)
    }

    /// Scan and return only the absolute paths.
    pub fn scan_paths(&self) -> Result<Vec<PathBuf>, ScanError> {
        Ok(self.scan()?.into_iter().map(|file| file.path).collect())
    }

    /// Whether a path would be returned by a scan, ignoring gitignore rules
    /// and whether it exists.
    pub fn accepts(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) || !is_source_file(path) {
            return false;
        }
        if self.is_excluded(path) {
            return false;
        }
        match self.filter {
            Some(ref pattern) => pattern.matches_path(&self.relative_path(path)),
            None => true,
        }
    }

    /// Whether a path lies in an excluded directory.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded.iter().any(|dir| path.starts_with(dir))
    }

    /// Get the relative path from root.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root).unwrap_or(path).to_path_buf()
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
