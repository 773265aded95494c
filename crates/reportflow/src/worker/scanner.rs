use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{
    new_debouncer_opt, Config as DebouncerConfig, DebounceEventResult, DebouncedEventKind,
};
use walkdir::WalkDir;

use crate::error::WatcherError;
use crate::sanitize;
use crate::worker::filter::FileFilter;
use crate::worker::job::Job;

pub struct DirectoryScanner {
    incoming_directory: PathBuf,
    recursive: bool,
    filter: FileFilter,
    poll_interval: Duration,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(incoming_directory: P, filter: FileFilter) -> Self {
        Self {
            incoming_directory: incoming_directory.as_ref().to_path_buf(),
            recursive: false,
            filter,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(Duration::from_millis(10));
        self
    }

    pub fn incoming_directory(&self) -> &Path {
        &self.incoming_directory
    }

    /// Lists payload files already sitting in the incoming directory.
    ///
    /// Only an unreadable incoming directory is an error; unreadable
    /// entries below it are logged and skipped.
    pub fn scan(&self) -> Result<Vec<Job>, WatcherError> {
        let mut jobs = Vec::new();
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        for entry in WalkDir::new(&self.incoming_directory)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(WatcherError::ScanFailed {
                        path: self.incoming_directory.clone(),
                        source: e,
                    });
                }
                Err(e) => {
                    warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if self.filter.is_candidate(path) {
                debug!("Found incoming file: {}", sanitize::redact_path(path));
                jobs.push(Job::new(path.to_path_buf()));
            }
        }

        info!("Scanned {} incoming files", jobs.len());
        Ok(jobs)
    }

    /// Blocks until `shutdown` is set, calling `callback` for every payload
    /// path that appears or changes. `on_ready` runs once the watch is
    /// registered, so a scan started from it cannot miss a file.
    pub fn watch<F, R>(
        &self,
        callback: F,
        shutdown: Arc<AtomicBool>,
        on_ready: R,
    ) -> Result<(), WatcherError>
    where
        F: Fn(PathBuf),
        R: FnOnce(),
    {
        // Use PollWatcher for Docker/NFS compatibility
        let poll_config = NotifyConfig::default().with_poll_interval(self.poll_interval);

        let debouncer_config = DebouncerConfig::default()
            .with_timeout(self.poll_interval)
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();

        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WatcherError::Watch(e.to_string()))?;

        let mode = if self.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer
            .watcher()
            .watch(&self.incoming_directory, mode)
            .map_err(|e| WatcherError::Watch(e.to_string()))?;

        info!("Watching incoming directory (recursive: {})", self.recursive);
        on_ready();

        self.dispatch(&rx, &callback, &shutdown);
        Ok(())
    }

    /// Feeds debounced events to `callback` until shutdown or until the
    /// sender goes away. Observation errors are logged and skipped.
    fn dispatch<F>(&self, rx: &Receiver<DebounceEventResult>, callback: &F, shutdown: &AtomicBool)
    where
        F: Fn(PathBuf),
    {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Watch mode shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = event.path;
                        if path.is_file() && self.filter.is_candidate(&path) {
                            debug!("Incoming file event: {}", sanitize::redact_path(&path));
                            callback(path);
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!("Watch error: {:?}", e);
                }
                Err(RecvTimeoutError::Timeout) => {
                    continue;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Watch channel disconnected");
                    break;
                }
            }
        }
    }
}
