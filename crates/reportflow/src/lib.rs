pub mod analysis;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod intake;
pub mod logging;
pub mod pipeline;
pub mod records;
pub mod sanitize;
pub mod worker;

pub use analysis::{AnalysisEngine, AnalysisError, AnalysisResult, SubprocessInvoker};
pub use config::{load_config, resolve_config_path, Config};
pub use db::{Database, PersistenceError};
pub use error::{ConfigError, ReportflowError, Result, StorageError, WatcherError};
pub use guard::{Admission, IdempotencyGuard, MarkerError, MarkerStore};
pub use intake::{DepositReceipt, IncomingStore};
pub use pipeline::{Pipeline, PipelineConfig, PipelineContext, PipelineError, Stage};
pub use records::{ConsistencyScanner, Patient, PatientResolver, Report, ReportStatus, ReportWriter};
pub use worker::{IngestionWatcher, Job, JobOutcome, JobResult};
