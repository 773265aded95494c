//! Test harness for isolated pipeline runs.
//!
//! Each harness owns a temp directory holding the incoming directory,
//! engine scripts and the SQLite database file.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tempfile::TempDir;

use reportflow::analysis::AnalysisEngine;
use reportflow::config::Config;
use reportflow::db::{patient_repo, report_repo, Database};
use reportflow::guard::{IdempotencyGuard, SidecarMarkerStore};
use reportflow::pipeline::{NoopProgress, Pipeline, PipelineConfig, PipelineContext};
use reportflow::records::{Patient, PatientResolver, Report, ReportWriter};
use reportflow::worker::{IngestionWatcher, Job, JobResult};

use super::ConfigBuilder;

pub struct TestHarness {
    temp_dir: TempDir,
    pub incoming_dir: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let incoming_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&incoming_dir).expect("Failed to create incoming directory");
        let db = Database::open(&temp_dir.path().join("data").join("reportflow.db"))
            .expect("Failed to open database");

        Self {
            temp_dir,
            incoming_dir,
            db,
        }
    }

    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> ConfigBuilder {
        ConfigBuilder::new(&self.incoming_dir)
    }

    /// Writes a shell script run as `sh <script> <file>`.
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, body).expect("Failed to write engine script");
        path
    }

    /// Writes a payload file into the incoming directory.
    pub fn drop_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.incoming_dir.join(name);
        std::fs::write(&path, content).expect("Failed to write incoming file");
        path
    }

    /// Production wiring, driven by a config document.
    pub fn pipeline_from_config(&self, config: &Config) -> Pipeline {
        Pipeline::from_config(config, self.db.clone()).expect("Failed to build pipeline")
    }

    /// Default settings with an in-process engine and sidecar markers.
    pub fn pipeline_with_engine(&self, engine: Arc<dyn AnalysisEngine>) -> Pipeline {
        let config = PipelineConfig::from_config(&self.config().build());
        Pipeline::new(
            config,
            IdempotencyGuard::new(Arc::new(SidecarMarkerStore::new())),
            engine,
            self.db.clone(),
        )
    }

    /// Watcher over the incoming directory with the default test settings.
    pub fn watcher(&self, pipeline: Pipeline, worker_count: usize) -> IngestionWatcher {
        let config = self.config().build();
        IngestionWatcher::new(
            &self.incoming_dir,
            worker_count,
            config.watcher,
            Arc::new(pipeline),
        )
    }

    pub fn run(&self, pipeline: &Pipeline, path: &Path) -> JobResult {
        let ctx = PipelineContext::new(Job::new(path.to_path_buf()));
        let (result, _ctx) = pipeline.run(ctx, &NoopProgress, &AtomicBool::new(false));
        result
    }

    pub fn patient(&self, patient_id: &str) -> Patient {
        PatientResolver::new(self.db.clone())
            .load(patient_id)
            .expect("Failed to load patient")
    }

    pub fn report(&self, report_id: &str) -> Report {
        ReportWriter::new(self.db.clone())
            .find(report_id)
            .expect("Failed to load report")
            .expect("Report not found")
    }

    pub fn patient_count(&self) -> u64 {
        patient_repo::count(&self.db).unwrap()
    }

    pub fn report_count(&self) -> u64 {
        report_repo::count(&self.db).unwrap()
    }
}
