//! Detection and repair of inconsistencies left by partial writes.
//!
//! Two shapes are possible: orphan reports whose id never made it into the
//! patient's list, and several reports for one file reference after a
//! marker write failed and the file was processed again.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::report_repo::{self, OrphanRow};
use crate::db::{patient_repo, Database, PersistenceError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateFile {
    pub file_location: String,
    pub report_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub orphan_report_ids: Vec<String>,
    pub duplicate_files: Vec<DuplicateFile>,
}

impl ConsistencyReport {
    pub fn is_clean(&self) -> bool {
        self.orphan_report_ids.is_empty() && self.duplicate_files.is_empty()
    }
}

#[derive(Clone)]
pub struct ConsistencyScanner {
    db: Database,
}

impl ConsistencyScanner {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn scan(&self) -> Result<ConsistencyReport, PersistenceError> {
        let orphans = report_repo::find_orphans(&self.db)?;
        let duplicates = report_repo::duplicate_file_locations(&self.db)?;

        for orphan in &orphans {
            warn!(
                report_id = %orphan.report_id,
                patient_id = %orphan.patient_id,
                "Report is not linked to its patient"
            );
        }
        for (location, count) in &duplicates {
            warn!(reports = count, "File reference {} has duplicate reports", location);
        }

        Ok(ConsistencyReport {
            orphan_report_ids: orphans.into_iter().map(|o| o.report_id).collect(),
            duplicate_files: duplicates
                .into_iter()
                .map(|(file_location, report_count)| DuplicateFile {
                    file_location,
                    report_count,
                })
                .collect(),
        })
    }

    /// Startup check: scans, then re-links orphans. Findings are logged
    /// by `scan` and `repair`, once each.
    pub fn check_and_repair(&self) -> Result<ConsistencyReport, PersistenceError> {
        let report = self.scan()?;
        if report.is_clean() {
            debug!("Consistency scan found nothing to repair");
        } else if !report.orphan_report_ids.is_empty() {
            self.repair()?;
        }
        Ok(report)
    }

    /// Appends every orphan report to its patient's list. Duplicates are
    /// reported only; deciding which copy is authoritative needs a human.
    pub fn repair(&self) -> Result<usize, PersistenceError> {
        let orphans: Vec<OrphanRow> = report_repo::find_orphans(&self.db)?;
        let mut repaired = 0;
        for orphan in orphans {
            patient_repo::append_report(&self.db, &orphan.patient_id, &orphan.report_id)?;
            repaired += 1;
        }
        if repaired > 0 {
            info!(repaired, "Linked orphan reports to their patients");
        }
        Ok(repaired)
    }
}
