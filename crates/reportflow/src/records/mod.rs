//! Patient and report records: identity resolution, report persistence
//! and consistency checks.

pub mod patient;
pub mod reconcile;
pub mod report;
pub mod resolver;
pub mod writer;

pub use patient::{generate_patient_id, normalize_date_of_birth, Patient, UNKNOWN};
pub use reconcile::{ConsistencyReport, ConsistencyScanner, DuplicateFile};
pub use report::{clamp_score, DoctorVerification, FileInfo, Report, ReportStatus};
pub use resolver::{PatientResolver, Resolution};
pub use writer::{ReportWriter, WriteError};
