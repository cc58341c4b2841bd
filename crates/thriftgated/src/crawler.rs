//! Schema file discovery and change tracking.
//!
//! The [`FileMonitor`] knows every schema file below the configured root and
//! keeps one change flag per file. Paths are stored relative to the root after
//! lexical normalisation, so `./a/../calc.thrift` and `calc.thrift` name the
//! same entry. A background crawler thread re-walks the tree and raises the
//! flag whenever a file appears or its modification fingerprint moves;
//! request handlers consume the flag with [`FileMonitor::take_changed`].

use std::collections::HashSet;
use std::collections::hash_map::{Entry, HashMap};
use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobMatcher};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const CRAWLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::crawler");
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Errors raised by the file monitor.
#[derive(Debug, Error)]
pub enum CrawlerError {
    /// The schema file pattern is not a valid glob.
    #[error("invalid schema pattern '{pattern}': {source}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Glob compilation failure.
        #[source]
        source: globset::Error,
    },
    /// The path was never registered with the monitor.
    #[error("schema file '{path}' is not tracked")]
    Untracked {
        /// Normalised path.
        path: Utf8PathBuf,
    },
    /// The crawler thread could not be spawned.
    #[error("failed to spawn crawler thread: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The crawler thread panicked.
    #[error("crawler thread panicked")]
    ThreadPanic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    modified: Option<SystemTime>,
    len: u64,
}

impl Fingerprint {
    fn of(path: &Utf8Path) -> Option<Self> {
        let metadata = fs::metadata(path).ok()?;
        Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }
}

#[derive(Debug)]
struct TrackedFile {
    changed: AtomicBool,
    fingerprint: Mutex<Option<Fingerprint>>,
}

impl TrackedFile {
    fn new(fingerprint: Option<Fingerprint>) -> Self {
        Self {
            changed: AtomicBool::new(true),
            fingerprint: Mutex::new(fingerprint),
        }
    }

    /// Records a fresh observation; raises the flag when it differs.
    fn observe(&self, fingerprint: Option<Fingerprint>) -> bool {
        let mut current = self
            .fingerprint
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current == fingerprint {
            return false;
        }
        *current = fingerprint;
        self.changed.store(true, Ordering::SeqCst);
        true
    }
}

/// Tracks schema files below a root directory.
#[derive(Debug)]
pub struct FileMonitor {
    root: Utf8PathBuf,
    pattern: GlobMatcher,
    files: RwLock<HashMap<Utf8PathBuf, Arc<TrackedFile>>>,
}

impl FileMonitor {
    /// Creates a monitor for files below `root` whose names match `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Pattern`] when `pattern` is not a valid glob.
    pub fn new(root: impl Into<Utf8PathBuf>, pattern: &str) -> Result<Self, CrawlerError> {
        let glob = Glob::new(pattern).map_err(|source| CrawlerError::Pattern {
            pattern: pattern.to_owned(),
            source,
        })?;
        Ok(Self {
            root: root.into(),
            pattern: glob.compile_matcher(),
            files: RwLock::new(HashMap::new()),
        })
    }

    /// Root directory of the schema tree.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Filesystem location of a root-relative path.
    #[must_use]
    pub fn absolute(&self, path: &Utf8Path) -> Utf8PathBuf {
        self.root.join(path)
    }

    /// Root-relative key for `path`, or `None` when it escapes the root.
    #[must_use]
    pub fn key(&self, path: &Utf8Path) -> Option<Utf8PathBuf> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let normalised = normalize_path(relative);
        let escapes = matches!(
            normalised.components().next(),
            Some(Utf8Component::ParentDir) | None
        );
        (!escapes).then_some(normalised)
    }

    /// Walks the root and yields every matching file, relative to the root.
    ///
    /// The walk follows symbolic links. Each call starts a fresh walk;
    /// unreadable entries are skipped.
    pub fn scan(&self) -> impl Iterator<Item = Utf8PathBuf> + '_ {
        WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(error) => {
                    debug!(target: CRAWLER_TARGET, %error, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| self.pattern.is_match(entry.file_name()))
            .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
            .filter_map(|path| self.key(&path))
    }

    /// Re-walks the tree, flagging new and modified files and forgetting
    /// files that disappeared. Returns the number of flagged files.
    pub fn refresh(&self) -> usize {
        let mut seen = HashSet::new();
        let mut flagged = 0_usize;
        for path in self.scan() {
            let fingerprint = Fingerprint::of(&self.absolute(&path));
            if self.observe(&path, fingerprint) {
                flagged = flagged.saturating_add(1);
            }
            seen.insert(path);
        }
        self.write_files().retain(|path, _| seen.contains(path));
        flagged
    }

    /// Whether `path` is a known schema file.
    ///
    /// An unknown path that exists and matches the pattern is registered as
    /// changed before returning `true`.
    pub fn contains(&self, path: &Utf8Path) -> bool {
        let Some(key) = self.key(path) else {
            return false;
        };
        if self.read_files().contains_key(&key) {
            return true;
        }
        let absolute = self.absolute(&key);
        let matches = key
            .file_name()
            .is_some_and(|name| self.pattern.is_match(name));
        if !matches || !absolute.is_file() {
            return false;
        }
        self.observe(&key, Fingerprint::of(&absolute));
        true
    }

    /// Marks `path` as current.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Untracked`] for unknown paths.
    pub fn access(&self, path: &Utf8Path) -> Result<(), CrawlerError> {
        self.tracked(path)?.changed.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Reads the change flag of `path` without clearing it.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Untracked`] for unknown paths.
    pub fn is_changed(&self, path: &Utf8Path) -> Result<bool, CrawlerError> {
        Ok(self.tracked(path)?.changed.load(Ordering::SeqCst))
    }

    /// Reads and clears the change flag of `path` in one step.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Untracked`] for unknown paths.
    pub fn take_changed(&self, path: &Utf8Path) -> Result<bool, CrawlerError> {
        Ok(self.tracked(path)?.changed.swap(false, Ordering::SeqCst))
    }

    /// Every tracked path, sorted.
    #[must_use]
    pub fn known(&self) -> Vec<Utf8PathBuf> {
        let mut paths: Vec<_> = self.read_files().keys().cloned().collect();
        paths.sort();
        paths
    }

    fn tracked(&self, path: &Utf8Path) -> Result<Arc<TrackedFile>, CrawlerError> {
        let untracked = || CrawlerError::Untracked {
            path: normalize_path(path),
        };
        let key = self.key(path).ok_or_else(untracked)?;
        self.read_files().get(&key).cloned().ok_or_else(untracked)
    }

    fn observe(&self, path: &Utf8Path, fingerprint: Option<Fingerprint>) -> bool {
        if let Some(tracked) = self.read_files().get(path) {
            return tracked.observe(fingerprint);
        }
        match self.write_files().entry(path.to_path_buf()) {
            Entry::Occupied(entry) => entry.get().observe(fingerprint),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(TrackedFile::new(fingerprint)));
                true
            }
        }
    }

    fn read_files(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<Utf8PathBuf, Arc<TrackedFile>>> {
        self.files.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_files(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<Utf8PathBuf, Arc<TrackedFile>>> {
        self.files.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lexically normalises `path`: drops `.` and root components and folds
/// `name/..` pairs. Leading `..` components are kept.
#[must_use]
pub fn normalize_path(path: &Utf8Path) -> Utf8PathBuf {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        match component {
            Utf8Component::Normal(part) => parts.push(part),
            Utf8Component::ParentDir => {
                if parts.last().is_some_and(|last| *last != "..") {
                    parts.pop();
                } else {
                    parts.push("..");
                }
            }
            Utf8Component::CurDir | Utf8Component::RootDir | Utf8Component::Prefix(_) => {}
        }
    }
    Utf8PathBuf::from(parts.join("/"))
}

/// Background thread that periodically calls [`FileMonitor::refresh`].
pub struct CrawlerHandle {
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CrawlerHandle {
    /// Starts crawling `monitor` every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::Spawn`] when the thread cannot be created.
    pub fn spawn(monitor: Arc<FileMonitor>, interval: Duration) -> Result<Self, CrawlerError> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name("thriftgate-crawler".to_owned())
            .spawn(move || run_crawler(&monitor, interval, &flag))
            .map_err(|source| CrawlerError::Spawn { source })?;
        Ok(Self {
            shutdown,
            handle: Some(handle),
        })
    }

    /// Asks the crawler to stop after its current pass.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits for the crawler thread to exit.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlerError::ThreadPanic`] when the thread panicked.
    pub fn join(mut self) -> Result<(), CrawlerError> {
        self.shutdown();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| CrawlerError::ThreadPanic),
            None => Ok(()),
        }
    }
}

impl Drop for CrawlerHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

fn run_crawler(monitor: &FileMonitor, interval: Duration, shutdown: &AtomicBool) {
    debug!(target: CRAWLER_TARGET, root = %monitor.root(), "crawler started");
    while !shutdown.load(Ordering::SeqCst) {
        let flagged = monitor.refresh();
        if flagged > 0 {
            debug!(target: CRAWLER_TARGET, flagged, "schema files changed");
        }
        let mut waited = Duration::ZERO;
        while waited < interval && !shutdown.load(Ordering::SeqCst) {
            thread::sleep(SHUTDOWN_POLL);
            waited = waited.saturating_add(SHUTDOWN_POLL);
        }
    }
    debug!(target: CRAWLER_TARGET, "crawler stopped");
}

#[cfg(test)]
mod tests;
