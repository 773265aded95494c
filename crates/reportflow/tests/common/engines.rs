//! Fake analysis engines.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use reportflow::analysis::{
    AnalysisEngine, AnalysisError, AnalysisResult, PatientMetadata, RiskAssessment, RiskLevel,
};

/// Engine output for the reference patient.
pub const JANE_DOE_JSON: &str = r#"{
  "metadata": {
    "name": "Jane Doe",
    "dob": "1980-04-12",
    "sex": "Female",
    "phoneNumber": "555-0100"
  },
  "analysis": {
    "riskLevel": "high",
    "cancerPositiveScore": 82,
    "diagnosisAnalysis": "Irregular mass in the upper outer quadrant."
  }
}"#;

/// Shell script body that prints `json` and exits 0.
pub fn printing_script(json: &str) -> String {
    format!("cat <<'JSON'\n{}\nJSON\n", json)
}

/// Engine output with the given identity and score.
pub fn engine_json(name: Option<&str>, dob: Option<&str>, phone: Option<&str>, score: &str) -> String {
    let mut metadata = serde_json::Map::new();
    if let Some(name) = name {
        metadata.insert("name".into(), name.into());
    }
    if let Some(dob) = dob {
        metadata.insert("dob".into(), dob.into());
    }
    if let Some(phone) = phone {
        metadata.insert("phoneNumber".into(), phone.into());
    }
    format!(
        r#"{{"metadata": {}, "analysis": {{"riskLevel": "medium", "cancerPositiveScore": {}, "diagnosisAnalysis": "ok"}}}}"#,
        serde_json::Value::Object(metadata),
        score
    )
}

/// In-process engine returning a fixed result, optionally after a delay.
pub struct FixedEngine {
    result: AnalysisResult,
    delay: Duration,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl FixedEngine {
    pub fn new(name: &str, dob: &str) -> Self {
        Self {
            result: AnalysisResult {
                metadata: PatientMetadata {
                    name: Some(name.to_string()),
                    date_of_birth: Some(dob.to_string()),
                    sex: None,
                    phone_number: None,
                },
                analysis: RiskAssessment {
                    risk_level: RiskLevel::Low,
                    cancer_positive_score: 10.0,
                    diagnosis_analysis: "No significant findings".to_string(),
                },
            },
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl AnalysisEngine for FixedEngine {
    fn analyze(&self, file_path: &Path) -> Result<AnalysisResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(file_path.to_path_buf());
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(self.result.clone())
    }
}
