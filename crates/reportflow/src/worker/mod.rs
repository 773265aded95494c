pub mod filter;
pub mod job;
pub mod pool;
pub mod scanner;
pub mod watcher;

pub use filter::FileFilter;
pub use job::{Job, JobOutcome, JobResult, ProcessedSummary, SkipReason};
pub use pool::WorkerPool;
pub use scanner::DirectoryScanner;
pub use watcher::IngestionWatcher;

// Result receivers are crossbeam channels.
pub use crossbeam_channel;
