//! # ipcgen-cli
//!
//! CLI library for generating Electron IPC wiring from TypeScript API
//! modules.
//!
//! This crate drives the `ipcgen` core: it loads `ipcgen.toml`, scans the
//! API and event directories, owns the working set across rebuilds, writes
//! the generated artifacts and watches for changes.
//!
//! ## Architecture
//!
//! - [`config`] - Configuration management and TOML parsing
//! - [`scanner`] - Source file discovery and filtering
//! - [`build`] - One-shot builds, incremental rebuilds and watch mode
//! - [`writer`] - File output and dry-run support
//! - [`watcher`] - File system watching for watch mode
//! - [`error`] - Error types and handling

pub mod build;
pub mod config;
pub mod error;
pub mod scanner;
pub mod watcher;
pub mod writer;

pub use build::{BuildOrchestrator, BuildOutput, RebuildOutcome, WorkingSet};
pub use config::{BuildOptions, Config, ConfigManager};
pub use error::{CliError, CliResult};
pub use scanner::{SourceFile, SourceScanner};
pub use watcher::FileWatcher;
pub use writer::FileWriter;
