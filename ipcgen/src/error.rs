//! Error types for the core pipeline.
//!
//! Extraction never fails as a whole: these errors describe a single file
//! that could not be read or parsed and are absorbed into diagnostics.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for per-file resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// A source file could not be turned into a module index.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The parser gave up on the file.
    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

impl ResolveError {
    /// Create a read error.
    pub fn read(path: PathBuf, source: std::io::Error) -> Self {
        Self::Read { path, source }
    }

    /// Create a parse error.
    pub fn parse(path: PathBuf, message: impl Into<String>) -> Self {
        Self::Parse {
            path,
            message: message.into(),
        }
    }

    /// Path of the offending file.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}
