//! File watcher for watch mode.
//!
//! One recursive `notify` watcher per root (the API directory and, when
//! configured, the event directory). Notifications are flattened into one
//! [`FileChange`] per affected path and delivered over a channel. Access
//! notifications are dropped here.

use crate::error::WatchError;
use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Which watched directory a change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchRoot {
    /// The API source directory.
    Api,
    /// The event definition directory.
    Events,
}

/// What happened to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Created or written.
    Content,
    /// Renamed from or to this path.
    Rename,
    /// Removed.
    Remove,
    /// Permissions or timestamps only.
    Metadata,
}

/// A change to one path under a watched root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub kind: ChangeKind,
    pub path: PathBuf,
    pub root: WatchRoot,
}

/// Event delivered by the watcher.
#[derive(Debug, Clone)]
pub enum WatchEvent {
    /// A path changed.
    Change(FileChange),
    /// The backend reported an error.
    Error(String),
}

/// Map a `notify` event kind to a change kind. `None` for access events.
pub fn classify(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Content),
        EventKind::Modify(ModifyKind::Name(_)) => Some(ChangeKind::Rename),
        EventKind::Modify(ModifyKind::Metadata(_)) => Some(ChangeKind::Metadata),
        EventKind::Modify(_) => Some(ChangeKind::Content),
        EventKind::Remove(_) => Some(ChangeKind::Remove),
        EventKind::Any | EventKind::Other => Some(ChangeKind::Content),
        EventKind::Access(_) => None,
    }
}

/// Watches one or more roots recursively.
#[derive(Debug, Default)]
pub struct FileWatcher {
    roots: Vec<(PathBuf, WatchRoot)>,
}

/// Live watchers. Dropping this stops the notifications.
pub struct WatchHandle {
    _watchers: Vec<RecommendedWatcher>,
}

impl FileWatcher {
    /// Create a watcher with no roots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root directory.
    pub fn with_root(mut self, path: impl Into<PathBuf>, root: WatchRoot) -> Self {
        self.roots.push((path.into(), root));
        self
    }

    /// Start watching every root.
    ///
    /// Returns a handle that keeps the watchers alive and a receiver of
    /// watch events.
    pub fn watch(&self) -> Result<(WatchHandle, Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = channel::<WatchEvent>();
        let mut watchers = Vec::with_capacity(self.roots.len());

        for (path, root) in &self.roots {
            let mut watcher = notify::recommended_watcher(forward(tx.clone(), *root))
                .map_err(|e| WatchError::Init(e.to_string()))?;
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|e| WatchError::Init(format!("{}: {e}", path.display())))?;
            watchers.push(watcher);
        }

        Ok((
            WatchHandle {
                _watchers: watchers,
            },
            rx,
        ))
    }

    /// Get the watched roots.
    #[cfg(test)]
    fn roots(&self) -> impl Iterator<Item = (&std::path::Path, WatchRoot)> {
        self.roots.iter().map(|(path, root)| (path.as_path(), *root))
    }
}

fn forward(
    tx: Sender<WatchEvent>,
    root: WatchRoot,
) -> impl FnMut(notify::Result<notify::Event>) + Send + 'static {
    move |result| match result {
        Ok(event) => {
            let Some(kind) = classify(&event.kind) else {
                return;
            };
            for path in event.paths {
                let _ = tx.send(WatchEvent::Change(FileChange { kind, path, root }));
            }
        }
        Err(e) => {
            let _ = tx.send(WatchEvent::Error(WatchError::from(e).to_string()));
        }
    }
}

impl WatchEvent {
    /// Get the changed path, if this is a change.
    #[cfg(test)]
    fn path(&self) -> Option<&std::path::Path> {
        match self {
            WatchEvent::Change(change) => Some(&change.path),
            WatchEvent::Error(_) => None,
        }
    }

    /// Check if this is an error event.
    #[cfg(test)]
    fn is_error(&self) -> bool {
        matches!(self, WatchEvent::Error(_))
    }
}
