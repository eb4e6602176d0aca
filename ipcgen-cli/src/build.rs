//! Build orchestration: one-shot builds, incremental rebuilds and watch mode.
//!
//! The orchestrator owns the working set, the sorted model of every known
//! API function and event. Extractors and generators only ever see
//! snapshots of it. Rebuilds are serialized by a single [`RebuildLock`]; a
//! change notification that finds the lock held is dropped, not queued.

use crate::config::BuildOptions;
use crate::error::{BuildError, CliResult, ScanError};
use crate::scanner::SourceScanner;
use crate::watcher::{ChangeKind, FileChange, FileWatcher, WatchEvent, WatchRoot};
use crate::writer::{FileWriter, WriteResult};
use ipcgen::model::{merge_records, remove_records, sort_by_path};
use ipcgen::resolver::paths::normalize_path;
use ipcgen::{
    generate_all, ApiExtractor, EventExtractor, EventPackageInfo, GeneratedFile, PackageInfo,
    Skipped,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Coarse lock held for the whole of a build or rebuild.
#[derive(Debug, Default)]
pub struct RebuildLock {
    held: AtomicBool,
}

/// Releases the [`RebuildLock`] when dropped.
#[derive(Debug)]
pub struct RebuildGuard<'a> {
    lock: &'a RebuildLock,
}

impl RebuildLock {
    /// Take the lock, or `None` when it is already held.
    pub fn try_acquire(&self) -> Option<RebuildGuard<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RebuildGuard { lock: self })
    }

    #[cfg(test)]
    fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl Drop for RebuildGuard<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

/// Sorted model of every known function and event.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingSet {
    pub packages: Vec<PackageInfo>,

    /// `None` when events are not configured or their directory is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_packages: Option<Vec<EventPackageInfo>>,
}

impl WorkingSet {
    /// Sort packages by path and their entries by name.
    pub fn sort(&mut self) {
        sort_by_path(&mut self.packages);
        if let Some(events) = self.event_packages.as_mut() {
            sort_by_path(events);
        }
    }

    pub fn function_count(&self) -> usize {
        self.packages.iter().map(|p| p.func.len()).sum()
    }

    pub fn event_count(&self) -> usize {
        self.event_packages
            .iter()
            .flatten()
            .map(|p| p.events.len())
            .sum()
    }

    /// Channel names declared more than once. Functions and events travel
    /// in opposite directions, so each kind is checked on its own.
    pub fn duplicate_channels(&self) -> Vec<String> {
        let functions = self
            .packages
            .iter()
            .flat_map(|p| p.func.iter().map(|f| f.name.as_str()));
        let events = self
            .event_packages
            .iter()
            .flatten()
            .flat_map(|p| p.events.iter().map(|e| e.name.as_str()));

        let mut duplicates = Vec::new();
        for names in [
            functions.collect::<Vec<_>>(),
            events.collect::<Vec<_>>(),
        ] {
            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for name in names {
                *counts.entry(name).or_default() += 1;
            }
            duplicates.extend(
                counts
                    .into_iter()
                    .filter(|(_, count)| *count > 1)
                    .map(|(name, _)| name.to_string()),
            );
        }
        duplicates
    }
}

/// Result of a one-shot build.
#[derive(Debug, Default)]
pub struct BuildOutput {
    pub working_set: WorkingSet,
    pub files: Vec<GeneratedFile>,
    /// Empty unless the files were handed to a writer.
    pub writes: Vec<WriteResult>,
    pub skipped: Vec<Skipped>,
}

/// What a change notification led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Another rebuild held the lock.
    Dropped,
    /// Nothing relevant changed.
    Ignored,
    /// Records for a deleted path were removed and artifacts regenerated.
    Removed { path: PathBuf, written: usize },
    /// A path was re-extracted and artifacts regenerated.
    Updated { path: PathBuf, written: usize },
    /// The rebuild failed. The working set keeps its previous state.
    Failed(String),
}

/// What to do with the working set for one change.
enum Change {
    Remove(PathBuf),
    Update(PathBuf),
}

/// Owns the working set and runs builds against it.
#[derive(Debug)]
pub struct BuildOrchestrator {
    options: BuildOptions,
    extractor: ApiExtractor,
    api_scanner: SourceScanner,
    event_scanner: Option<SourceScanner>,
    writer: FileWriter,
    lock: RebuildLock,
    state: Mutex<WorkingSet>,
}

impl BuildOrchestrator {
    /// Create an orchestrator. Output directories are excluded from both
    /// scanners.
    pub fn new(options: BuildOptions) -> Result<Self, ScanError> {
        let excluded: Vec<PathBuf> = options
            .output_dirs()
            .into_iter()
            .map(Path::to_path_buf)
            .collect();

        let mut api_scanner =
            SourceScanner::new(&options.source_dir).with_excluded(excluded.iter().cloned());
        if let Some(ref filter) = options.filter {
            api_scanner = api_scanner.with_filter(filter)?;
        }

        let event_scanner = options
            .event_dir
            .as_ref()
            .map(|dir| SourceScanner::new(dir).with_excluded(excluded));

        Ok(Self {
            extractor: options.extractor(),
            options,
            api_scanner,
            event_scanner,
            writer: FileWriter::default(),
            lock: RebuildLock::default(),
            state: Mutex::new(WorkingSet::default()),
        })
    }

    /// Write nothing; results are reported as dry runs.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.writer = FileWriter::new(dry_run);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn lock(&self) -> &RebuildLock {
        &self.lock
    }

    /// Snapshot of the retained working set.
    pub fn working_set(&self) -> WorkingSet {
        self.state().clone()
    }

    fn state(&self) -> MutexGuard<'_, WorkingSet> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Extract and generate everything without writing or retaining the
    /// result.
    ///
    /// A missing source directory is an error. No source files at all
    /// yields an empty output with no generated files.
    pub fn plan(&self) -> CliResult<BuildOutput> {
        let paths = self.api_scanner.scan_paths()?;
        if paths.is_empty() {
            warn!(dir = %self.options.source_dir.display(), "No API source files found, skipping generation");
            return Ok(BuildOutput::default());
        }
        info!(files = paths.len(), "Extracting API functions");

        let report = self.extractor.extract_report(&paths, Vec::new());
        let mut skipped = report.skipped;
        let mut working_set = WorkingSet {
            packages: report.packages,
            event_packages: None,
        };

        if let Some(ref scanner) = self.event_scanner {
            match scanner.scan_paths() {
                Ok(paths) => {
                    info!(files = paths.len(), "Extracting events");
                    let report = EventExtractor.extract_report(&paths);
                    skipped.extend(report.skipped);
                    working_set.event_packages = Some(report.packages);
                }
                Err(ScanError::DirectoryNotFound { path }) => {
                    warn!(dir = %path.display(), "Event directory not found, skipping event artifacts");
                }
                Err(e) => return Err(e.into()),
            }
        }

        working_set.sort();
        warn_duplicates(&working_set);
        let files = self.generate(&working_set);

        info!(
            functions = working_set.function_count(),
            events = working_set.event_count(),
            skipped = skipped.len(),
            files = files.len(),
            "Generated artifacts"
        );

        Ok(BuildOutput {
            working_set,
            files,
            writes: Vec::new(),
            skipped,
        })
    }

    /// One-shot build: extract, generate, write and retain the working set.
    ///
    /// Fails with [`BuildError::Busy`] while another build holds the lock.
    pub fn build(&self) -> CliResult<BuildOutput> {
        let _guard = self.lock.try_acquire().ok_or(BuildError::Busy)?;

        let mut output = self.plan()?;
        output.writes = self.write(&output.files)?;
        *self.state() = output.working_set.clone();
        Ok(output)
    }

    /// Apply one change notification to the working set and regenerate.
    ///
    /// Never fails: errors are logged and reported as
    /// [`RebuildOutcome::Failed`].
    pub fn handle_change(&self, change: &FileChange) -> RebuildOutcome {
        let Some(_guard) = self.lock.try_acquire() else {
            warn!(path = %change.path.display(), "Rebuild in progress, dropping change notification");
            return RebuildOutcome::Dropped;
        };

        let Some(action) = self.classify(change) else {
            debug!(path = %change.path.display(), kind = ?change.kind, "Ignoring change");
            return RebuildOutcome::Ignored;
        };

        let mut next = self.working_set();
        let changed = match action {
            Change::Remove(ref path) => self.remove(&mut next, path, change.root),
            Change::Update(ref path) => {
                self.update(&mut next, path, change.root);
                true
            }
        };
        if !changed {
            debug!(path = %change.path.display(), "Removed path had no records");
            return RebuildOutcome::Ignored;
        }

        next.sort();
        warn_duplicates(&next);
        let files = self.generate(&next);
        match self.write(&files) {
            Ok(writes) => {
                let written = writes.iter().filter(|w| w.was_written()).count();
                *self.state() = next;
                match action {
                    Change::Remove(path) => {
                        info!(path = %path.display(), written, "Removed records and regenerated");
                        RebuildOutcome::Removed { path, written }
                    }
                    Change::Update(path) => {
                        info!(path = %path.display(), written, "Re-extracted and regenerated");
                        RebuildOutcome::Updated { path, written }
                    }
                }
            }
            Err(e) => {
                warn!(path = %change.path.display(), error = %e, "Rebuild failed");
                RebuildOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run a one-shot build, then rebuild on every change notification
    /// until the watchers stop.
    ///
    /// Each notification is handled on its own thread, so one arriving
    /// during a rebuild finds the lock held and is dropped.
    pub fn watch_build<F>(self: Arc<Self>, on_outcome: F) -> CliResult<()>
    where
        F: Fn(&FileChange, &RebuildOutcome) + Send + Sync + 'static,
    {
        self.build()?;

        let mut watcher = FileWatcher::new().with_root(&self.options.source_dir, WatchRoot::Api);
        if let Some(ref dir) = self.options.event_dir {
            if dir.is_dir() {
                watcher = watcher.with_root(dir, WatchRoot::Events);
            } else {
                warn!(dir = %dir.display(), "Event directory not found, not watching it");
            }
        }
        let (_handle, rx) = watcher.watch()?;
        info!(dir = %self.options.source_dir.display(), "Watching for changes");

        let on_outcome = Arc::new(on_outcome);
        for event in rx {
            match event {
                WatchEvent::Change(change) => {
                    let orchestrator = Arc::clone(&self);
                    let on_outcome = Arc::clone(&on_outcome);
                    std::thread::spawn(move || {
                        let outcome = orchestrator.handle_change(&change);
                        on_outcome(&change, &outcome);
                    });
                }
                WatchEvent::Error(message) => warn!(%message, "Watch error"),
            }
        }
        Ok(())
    }

    fn generate(&self, working_set: &WorkingSet) -> Vec<GeneratedFile> {
        generate_all(
            &working_set.packages,
            working_set.event_packages.as_deref(),
            &self.options.generation,
        )
    }

    fn write(&self, files: &[GeneratedFile]) -> CliResult<Vec<WriteResult>> {
        let mut writes = Vec::with_capacity(files.len());
        for file in files {
            let result = self.writer.write(&file.path, &file.content)?;
            debug!(artifact = %file.artifact, path = %file.path.display(), written = result.was_written(), "Wrote artifact");
            writes.push(result);
        }
        Ok(writes)
    }

    fn scanner_for(&self, root: WatchRoot) -> Option<&SourceScanner> {
        match root {
            WatchRoot::Api => Some(&self.api_scanner),
            WatchRoot::Events => self.event_scanner.as_ref(),
        }
    }

    /// Decide what a notification means for the working set.
    fn classify(&self, change: &FileChange) -> Option<Change> {
        let scanner = self.scanner_for(change.root)?;
        let path = normalize_path(&change.path);

        if scanner.is_excluded(&path) {
            return None;
        }
        if !path.exists() {
            return Some(Change::Remove(path));
        }
        if path.is_dir() || change.kind == ChangeKind::Metadata {
            return None;
        }
        scanner.accepts(&path).then_some(Change::Update(path))
    }

    fn remove(&self, working_set: &mut WorkingSet, path: &Path, root: WatchRoot) -> bool {
        match root {
            WatchRoot::Api => remove_records(&mut working_set.packages, path),
            WatchRoot::Events => working_set
                .event_packages
                .as_mut()
                .is_some_and(|events| remove_records(events, path)),
        }
    }

    fn update(&self, working_set: &mut WorkingSet, path: &Path, root: WatchRoot) {
        let paths = [path.to_path_buf()];
        match root {
            WatchRoot::Api => {
                let existing = std::mem::take(&mut working_set.packages);
                working_set.packages = self.extractor.extract(&paths, existing);
            }
            WatchRoot::Events => {
                let report = EventExtractor.extract_report(&paths);
                let existing = working_set.event_packages.take().unwrap_or_default();
                working_set.event_packages = Some(merge_records(existing, &paths, report.packages));
            }
        }
    }
}

fn warn_duplicates(working_set: &WorkingSet) {
    for name in working_set.duplicate_channels() {
        warn!(channel = %name, "Channel name declared in more than one place, the last registration wins");
    }
}
