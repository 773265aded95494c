use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{debug, error, info};
use tokio::sync::broadcast;

use crate::error::WatcherError;
use crate::pipeline::progress::{
    BroadcastProgress, JobPhase, JobProgressEvent, NoopProgress, ProgressEvent, ProgressReporter,
};
use crate::pipeline::{Pipeline, PipelineContext};
use crate::sanitize;
use crate::worker::job::{Job, JobResult};

const POLL: Duration = Duration::from_millis(100);

/// Fixed set of threads running the pipeline, fed through a bounded queue.
///
/// The pool size caps how many analyses run at once. After [`shutdown`],
/// workers finish the job they hold and drop anything still queued.
///
/// [`shutdown`]: WorkerPool::shutdown
pub struct WorkerPool {
    job_sender: Sender<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn new(
        pipeline: Arc<Pipeline>,
        worker_count: usize,
        result_sender: Sender<JobResult>,
        progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
    ) -> Result<Self, WatcherError> {
        let worker_count = worker_count.max(1);
        let (job_sender, job_receiver) = bounded::<Job>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                jobs: job_receiver.clone(),
                results: result_sender.clone(),
                shutdown: Arc::clone(&shutdown),
                pipeline: Arc::clone(&pipeline),
                progress_sender: progress_sender.clone(),
            };

            let spawned = thread::Builder::new()
                .name(format!("reportflow-worker-{}", worker_id))
                .spawn(move || worker.run());

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    // Let the workers already started wind down on their own.
                    shutdown.store(true, Ordering::Relaxed);
                    return Err(WatcherError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            job_sender,
            workers: Mutex::new(workers),
            shutdown,
        })
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit(&self, job: Job) -> Result<(), WatcherError> {
        let mut job = job;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                return Err(WatcherError::ChannelClosed);
            }

            match self.job_sender.send_timeout(job, POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => job = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(WatcherError::ChannelClosed),
            }
        }
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins every worker. Call after [`WorkerPool::shutdown`].
    pub fn wait(&self) {
        let workers = {
            let mut guard = match self.workers.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };

        for (i, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

struct Worker {
    id: usize,
    jobs: Receiver<Job>,
    results: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
    progress_sender: Option<Arc<broadcast::Sender<JobProgressEvent>>>,
}

impl Worker {
    fn run(self) {
        debug!("Worker {} started", self.id);

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                debug!("Worker {} received shutdown signal", self.id);
                break;
            }

            match self.jobs.recv_timeout(POLL) {
                Ok(job) => {
                    let result = self.process(job);
                    if let Err(e) = self.results.send(result) {
                        error!("Worker {} failed to send result: {}", self.id, e);
                        break;
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    debug!("Worker {} job channel disconnected", self.id);
                    break;
                }
            }
        }

        debug!("Worker {} stopped", self.id);
    }

    fn process(&self, job: Job) -> JobResult {
        debug!(
            "Worker {} processing {}",
            self.id,
            sanitize::redact_path(&job.source_path)
        );

        match self.progress_sender {
            Some(ref sender) => {
                let progress = BroadcastProgress::new(
                    &job.id,
                    &sanitize::redact_path(&job.source_path),
                    job.mime_type.as_deref(),
                    Arc::clone(sender),
                );
                progress.report(ProgressEvent::Phase {
                    phase: JobPhase::Queued,
                    message: "Job picked up by worker".to_string(),
                });
                self.run_pipeline(job, &progress)
            }
            None => self.run_pipeline(job, &NoopProgress),
        }
    }

    fn run_pipeline(&self, job: Job, progress: &dyn ProgressReporter) -> JobResult {
        let ctx = PipelineContext::new(job);
        let (result, _ctx) = self.pipeline.run(ctx, progress, &self.shutdown);
        result
    }
}
