use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tracing::{debug, error, info, info_span, warn};

use crate::analysis::{AnalysisEngine, SubprocessInvoker};
use crate::config::{Config, MarkerStoreKind};
use crate::db::Database;
use crate::error::ReportflowError;
use crate::guard::{
    Admission, DatabaseMarkerStore, IdempotencyGuard, InFlightPermit, MarkerStore,
    SidecarMarkerStore,
};
use crate::records::{FileInfo, PatientResolver, ReportWriter};
use crate::sanitize;
use crate::worker::job::{JobResult, ProcessedSummary, SkipReason};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{JobPhase, ProgressEvent, ProgressReporter};
use super::stability::{Stability, StabilityWaiter};

/// How a run ended when it did not fail.
enum Flow {
    Processed(ProcessedSummary),
    Skipped(SkipReason),
}

/// One file's path from "seen" to "processed": admit, wait for the file to
/// settle, analyze, resolve the patient, write the report, mark.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    guard: IdempotencyGuard,
    engine: Arc<dyn AnalysisEngine>,
    resolver: PatientResolver,
    writer: ReportWriter,
    stability: StabilityWaiter,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        guard: IdempotencyGuard,
        engine: Arc<dyn AnalysisEngine>,
        db: Database,
    ) -> Self {
        let stability = StabilityWaiter::new(config.stability_window, config.stability_poll);
        let writer = ReportWriter::new(db.clone()).with_status(config.initial_status);
        let resolver = PatientResolver::new(db);

        Self {
            config: Arc::new(config),
            guard,
            engine,
            resolver,
            writer,
            stability,
        }
    }

    /// Production constructor: subprocess engine plus the configured marker store.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, ReportflowError> {
        let pipeline_config = PipelineConfig::from_config(config);

        let markers: Arc<dyn MarkerStore> = match pipeline_config.marker_store {
            MarkerStoreKind::Sidecar => Arc::new(SidecarMarkerStore::new()),
            MarkerStoreKind::Database => Arc::new(DatabaseMarkerStore::new(db.clone())),
        };
        let engine = SubprocessInvoker::from_config(&config.analysis)?;

        Ok(Self::new(
            pipeline_config,
            IdempotencyGuard::new(markers),
            Arc::new(engine),
            db,
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn guard(&self) -> &IdempotencyGuard {
        &self.guard
    }

    /// Runs every stage for one job. Errors never escape: they become a
    /// failed [`JobResult`] and the file stays unmarked.
    pub fn run(
        &self,
        mut ctx: PipelineContext,
        progress: &dyn ProgressReporter,
        shutdown: &AtomicBool,
    ) -> (JobResult, PipelineContext) {
        let path = ctx.job.source_path.clone();
        let _pipeline_span = info_span!("pipeline",
            job_id = %ctx.job.id,
            file = %sanitize::redact_path(&path),
            file_hash = %sanitize::hash_path(&path),
        )
        .entered();

        let result = match self.execute(&mut ctx, progress, shutdown) {
            Ok(Flow::Processed(summary)) => {
                progress.report(ProgressEvent::Completed {
                    report_id: summary.report_id.clone(),
                    patient_id: summary.patient_id.clone(),
                    is_new_patient: summary.is_new_patient,
                });
                JobResult::processed(&ctx.job, summary)
            }
            Ok(Flow::Skipped(reason)) => {
                info!(reason = %reason, "Skipped incoming file");
                progress.report(ProgressEvent::Skipped {
                    reason: reason.to_string(),
                });
                JobResult::skipped(&ctx.job, reason)
            }
            Err(e) => {
                let stage = e.stage();
                error!(stage = %stage, error = %e, "Processing failed; file left unmarked");
                progress.report(ProgressEvent::Failed {
                    stage,
                    error: e.to_string(),
                });
                JobResult::failure(&ctx.job, stage, e.to_string())
            }
        };

        (result, ctx)
    }

    fn execute(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
        shutdown: &AtomicBool,
    ) -> Result<Flow, PipelineError> {
        let path = ctx.job.source_path.clone();

        // Step 1: Admit
        let permit = {
            let _step = info_span!("admit").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Admitting,
                message: "Checking processing markers...".to_string(),
            });
            match self.step_admit(ctx)? {
                Ok(permit) => permit,
                Err(reason) => return Ok(Flow::Skipped(reason)),
            }
        };

        // Step 2: Await stable
        {
            let _step = info_span!("await_stable").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::AwaitingStability,
                message: "Waiting for upload to settle...".to_string(),
            });
            let state = self
                .stability
                .wait(&path, shutdown)
                .map_err(|source| PipelineError::Stability {
                    path: path.clone(),
                    source,
                })?;
            match state {
                Stability::Stable => debug!("File is stable"),
                Stability::Vanished => return Ok(Flow::Skipped(SkipReason::Vanished)),
                Stability::Interrupted => return Ok(Flow::Skipped(SkipReason::Interrupted)),
            }
        }

        // Step 3: Analyze
        let analysis = {
            let _step = info_span!("analyze").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Analyzing,
                message: "Running analysis engine...".to_string(),
            });
            let analysis = self.engine.analyze(&path)?;
            debug!(
                risk_level = %analysis.analysis.risk_level,
                score = analysis.analysis.cancer_positive_score,
                "Analysis finished"
            );
            analysis
        };

        // Step 4: Resolve patient
        let resolution = {
            let _step = info_span!("resolve").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Resolving,
                message: "Resolving patient...".to_string(),
            });
            self.resolver.resolve(&analysis.metadata)?
        };

        // Step 5: Write report
        let report = {
            let _step = info_span!("write").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Writing,
                message: "Writing report...".to_string(),
            });
            let file = FileInfo::for_incoming(
                &path,
                &self.config.incoming_directory,
                &self.config.file_location_prefix,
                ctx.job.mime_type.clone(),
            )
            .ok_or_else(|| PipelineError::InvalidPath(sanitize::redact_path(&path)))?;
            self.writer
                .write(&resolution.patient, &file, &analysis.analysis)?
        };

        let summary = ProcessedSummary {
            report_id: report.id.clone(),
            patient_id: resolution.patient.patient_id.clone(),
            is_new_patient: resolution.is_new,
            risk_level: report.risk_level,
            score: report.cancer_positive_score,
        };
        ctx.analysis = Some(analysis);
        ctx.resolution = Some(resolution);
        ctx.report = Some(report);

        // Step 6: Mark processed
        {
            let _step = info_span!("mark").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Marking,
                message: "Writing processing marker...".to_string(),
            });
            if let Err(source) = self.guard.mark_processed(&permit) {
                warn!(
                    report_id = %summary.report_id,
                    "Report stored but file not marked; it will be processed again"
                );
                return Err(PipelineError::Mark {
                    report_id: summary.report_id,
                    source,
                });
            }
        }

        info!(
            report_id = %summary.report_id,
            patient_id = %summary.patient_id,
            new_patient = summary.is_new_patient,
            "Processed incoming file"
        );

        Ok(Flow::Processed(summary))
    }

    /// Outer error is a marker read failure; inner error is a skip.
    fn step_admit(
        &self,
        ctx: &PipelineContext,
    ) -> Result<Result<InFlightPermit, SkipReason>, PipelineError> {
        let admission = self
            .guard
            .try_admit(&ctx.job.source_path)
            .map_err(PipelineError::Admission)?;

        Ok(match admission {
            Admission::Admitted(permit) => Ok(permit),
            Admission::AlreadyProcessed => Err(SkipReason::AlreadyProcessed),
            Admission::InFlight => Err(SkipReason::InFlight),
        })
    }
}
