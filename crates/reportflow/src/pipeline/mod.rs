pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;
pub mod stability;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use error::{PipelineError, Stage};
pub use progress::{
    BroadcastProgress, JobPhase, JobProgressEvent, JobStatus, NoopProgress, ProgressEvent,
    ProgressReporter,
};
pub use runner::Pipeline;
pub use stability::{Stability, StabilityWaiter};
