//! Ingestion watcher lifecycle: observe the incoming directory and feed
//! every payload file to the worker pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::WatcherConfig;
use crate::error::{ReportflowError, WatcherError};
use crate::pipeline::progress::JobProgressEvent;
use crate::pipeline::Pipeline;
use crate::sanitize;
use crate::worker::filter::FileFilter;
use crate::worker::job::{Job, JobResult};
use crate::worker::pool::WorkerPool;
use crate::worker::scanner::DirectoryScanner;

const PROGRESS_CAPACITY: usize = 256;
const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Owned watcher over one incoming directory.
///
/// `start` registers the watch, queues every file already present, then
/// keeps queueing files as they appear. `stop` ends observation and waits
/// for handlers that already picked up a file. The watcher can be started
/// again after it was stopped.
pub struct IngestionWatcher {
    incoming_directory: PathBuf,
    worker_count: usize,
    config: WatcherConfig,
    pipeline: Arc<Pipeline>,
    results_tx: Sender<JobResult>,
    results_rx: Receiver<JobResult>,
    progress_tx: Arc<broadcast::Sender<JobProgressEvent>>,
    running: Option<Running>,
}

struct Running {
    shutdown: Arc<AtomicBool>,
    pool: Arc<WorkerPool>,
    thread: JoinHandle<()>,
}

impl IngestionWatcher {
    pub fn new(
        incoming_directory: impl Into<PathBuf>,
        worker_count: usize,
        config: WatcherConfig,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        let (results_tx, results_rx) = unbounded();
        let (progress_tx, _) = broadcast::channel(PROGRESS_CAPACITY);

        Self {
            incoming_directory: incoming_directory.into(),
            worker_count,
            config,
            pipeline,
            results_tx,
            results_rx,
            progress_tx: Arc::new(progress_tx),
            running: None,
        }
    }

    pub fn incoming_directory(&self) -> &Path {
        &self.incoming_directory
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Finished jobs, in completion order.
    pub fn results(&self) -> Receiver<JobResult> {
        self.results_rx.clone()
    }

    /// Per-stage progress for every job from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobProgressEvent> {
        self.progress_tx.subscribe()
    }

    pub fn start(&mut self) -> Result<(), ReportflowError> {
        if self.running.is_some() {
            return Err(WatcherError::AlreadyRunning.into());
        }

        std::fs::create_dir_all(&self.incoming_directory).map_err(|e| {
            WatcherError::CreateDirectory {
                path: self.incoming_directory.clone(),
                source: e,
            }
        })?;
        // Canonical paths keep file identity stable for the marker store.
        let incoming = self
            .incoming_directory
            .canonicalize()
            .map_err(|e| WatcherError::CreateDirectory {
                path: self.incoming_directory.clone(),
                source: e,
            })?;

        let filter = FileFilter::from_config(&self.config)?;
        let scanner = DirectoryScanner::new(&incoming, filter)
            .with_recursive(self.config.recursive)
            .with_poll_interval(Duration::from_millis(self.config.poll_interval_ms));

        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&self.pipeline),
            self.worker_count,
            self.results_tx.clone(),
            Some(Arc::clone(&self.progress_tx)),
        )?);
        let shutdown = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), WatcherError>>();

        let thread_pool = Arc::clone(&pool);
        let thread_shutdown = Arc::clone(&shutdown);
        let spawned = std::thread::Builder::new()
            .name("reportflow-watcher".to_string())
            .spawn(move || watch_loop(scanner, thread_pool, thread_shutdown, ready_tx));

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                pool.shutdown();
                pool.wait();
                return Err(WatcherError::SpawnFailed(e.to_string()).into());
            }
        };

        let ready = ready_rx
            .recv_timeout(READY_TIMEOUT)
            .unwrap_or_else(|_| Err(WatcherError::Watch("watch thread did not start".to_string())));
        if let Err(e) = ready {
            shutdown.store(true, Ordering::Relaxed);
            pool.shutdown();
            if thread.join().is_err() {
                error!("Watch thread panicked during startup");
            }
            pool.wait();
            return Err(e.into());
        }

        info!(
            workers = self.worker_count,
            dir_hash = %sanitize::hash_path(&incoming),
            "Ingestion watcher started"
        );

        self.running = Some(Running {
            shutdown,
            pool,
            thread,
        });
        Ok(())
    }

    /// Stops observation and blocks until in-flight handlers finish.
    /// Queued jobs that no worker picked up are dropped unmarked.
    /// Calling `stop` on a stopped watcher does nothing.
    pub fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        info!("Stopping ingestion watcher...");
        running.shutdown.store(true, Ordering::Relaxed);
        running.pool.shutdown();

        if running.thread.join().is_err() {
            error!("Watch thread panicked");
        }
        running.pool.wait();

        info!("Ingestion watcher stopped");
    }
}

impl Drop for IngestionWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch_loop(
    scanner: DirectoryScanner,
    pool: Arc<WorkerPool>,
    shutdown: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<(), WatcherError>>,
) {
    let on_event = |path: PathBuf| submit(&pool, Job::new(path));

    let startup = ready.clone();
    let outcome = scanner.watch(
        on_event,
        Arc::clone(&shutdown),
        || {
            let _ = startup.send(Ok(()));
            match scanner.scan() {
                Ok(jobs) => {
                    for job in jobs {
                        submit(&pool, job);
                    }
                }
                Err(e) => warn!("Initial scan failed: {}", e),
            }
        },
    );

    if let Err(e) = outcome {
        error!("Watcher stopped with error: {}", e);
        // Only reaches the caller when startup has not been reported yet.
        let _ = ready.send(Err(e));
    }
}

fn submit(pool: &WorkerPool, job: Job) {
    let file = sanitize::redact_path(&job.source_path);
    match pool.submit(job) {
        Ok(()) => {}
        Err(WatcherError::ChannelClosed) => {
            info!(file = %file, "Watcher stopping; file left for the next start");
        }
        Err(e) => warn!(file = %file, error = %e, "Failed to queue incoming file"),
    }
}
