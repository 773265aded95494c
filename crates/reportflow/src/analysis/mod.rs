//! External analysis engine invocation.
//!
//! The engine is a black box: it receives one file path and prints one
//! JSON object with patient metadata and a risk assessment.

pub mod error;
pub mod invoker;
pub mod result;

use std::path::Path;

pub use error::AnalysisError;
pub use invoker::SubprocessInvoker;
pub use result::{
    parse_engine_output, AnalysisResult, PatientMetadata, RiskAssessment, RiskLevel,
    DEFAULT_DIAGNOSIS,
};

/// Something that can turn a report file into an [`AnalysisResult`].
///
/// Implementations must be safe to call from several worker threads at once.
pub trait AnalysisEngine: Send + Sync {
    fn analyze(&self, file_path: &Path) -> Result<AnalysisResult, AnalysisError>;
}
