use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reportflow::config::{load_config, resolve_config_path};
use reportflow::error::{ConfigError, ReportflowError};
use reportflow::logging::init_logging;
use reportflow::records::ConsistencyScanner;
use reportflow::sanitize;
use reportflow::worker::crossbeam_channel::RecvTimeoutError;
use reportflow::worker::{IngestionWatcher, JobOutcome, JobResult};
use reportflow::{Database, Pipeline};
use tracing::{debug, error, info, warn};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be up yet.
            eprintln!("reportflow: {}", e);
            error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), ReportflowError> {
    let explicit = std::env::args().nth(1);
    let config_path = resolve_config_path(explicit.as_deref()).ok_or_else(|| {
        ConfigError::Validation {
            message: "no config file: pass a path or set REPORTFLOW_CONFIG".to_string(),
        }
    })?;

    let config = load_config(&config_path)?;
    init_logging(&config.logging)?;
    info!("Starting reportflow v{}", env!("CARGO_PKG_VERSION"));

    let database_path = config.database_path().ok_or_else(|| ConfigError::Validation {
        message: "database_path is not set and no home directory was found".to_string(),
    })?;
    let db = Database::open(&database_path)?;
    check_consistency(&db);

    let pipeline = Arc::new(Pipeline::from_config(&config, db)?);
    let mut watcher = IngestionWatcher::new(
        &config.incoming_directory,
        config.worker_count,
        config.watcher.clone(),
        pipeline,
    );
    let results = watcher.results();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!("Could not install Ctrl-C handler: {}", e);
    }

    watcher.start()?;
    info!("Press Ctrl-C to stop");

    while !shutdown.load(Ordering::SeqCst) {
        match results.recv_timeout(Duration::from_millis(200)) {
            Ok(result) => log_result(&result),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    watcher.stop();
    for result in results.try_iter() {
        log_result(&result);
    }

    info!("reportflow stopped");
    Ok(())
}

/// Reports orphaned and duplicated reports left by earlier runs and
/// re-links the orphans.
fn check_consistency(db: &Database) {
    if let Err(e) = ConsistencyScanner::new(db.clone()).check_and_repair() {
        warn!("Consistency check failed: {}", e);
    }
}

fn log_result(result: &JobResult) {
    let file = sanitize::redact_path(&result.source_path);
    match &result.outcome {
        JobOutcome::Processed(summary) => info!(
            job_id = %result.job_id,
            file = %file,
            report_id = %summary.report_id,
            patient_id = %summary.patient_id,
            new_patient = summary.is_new_patient,
            risk_level = %summary.risk_level,
            score = summary.score,
            "Report filed"
        ),
        JobOutcome::Skipped(reason) => debug!(
            job_id = %result.job_id,
            file = %file,
            reason = %reason,
            "Job skipped"
        ),
        JobOutcome::Failed { stage, error } => warn!(
            job_id = %result.job_id,
            file = %file,
            stage = %stage,
            error = %error,
            "Job failed"
        ),
    }
}
