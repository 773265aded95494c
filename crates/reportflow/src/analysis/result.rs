//! Structured analysis output and the parser for the engine's stdout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::AnalysisError;

/// Placeholder used when the engine omits a diagnosis.
pub const DEFAULT_DIAGNOSIS: &str = "Analysis not available";

/// Risk category reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// Case-insensitive parse. Anything outside low/medium/high maps to `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient identity fields extracted from a report. Blank values are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientMetadata {
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    pub sex: Option<String>,
    pub phone_number: Option<String>,
}

/// Risk assessment produced by the engine. The score is passed through
/// unclamped; the report writer owns range enforcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub cancer_positive_score: f64,
    pub diagnosis_analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub metadata: PatientMetadata,
    pub analysis: RiskAssessment,
}

/// Parses the engine's stdout into an [`AnalysisResult`].
///
/// Requires a JSON object with `metadata` and `analysis` objects. Inside
/// them every field is optional and normalized.
pub fn parse_engine_output(stdout: &str) -> Result<AnalysisResult, AnalysisError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(AnalysisError::malformed("engine produced no output"));
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| AnalysisError::malformed(format!("stdout is not valid JSON: {}", e)))?;

    let root = value
        .as_object()
        .ok_or_else(|| AnalysisError::malformed("top-level value is not an object"))?;
    let metadata = object_field(root, "metadata")?;
    let analysis = object_field(root, "analysis")?;

    Ok(AnalysisResult {
        metadata: PatientMetadata {
            name: text_field(metadata, &["name"]),
            date_of_birth: text_field(metadata, &["dob", "dateOfBirth"]),
            sex: text_field(metadata, &["sex", "gender"]),
            phone_number: text_field(metadata, &["phoneNumber", "phone"]),
        },
        analysis: RiskAssessment {
            risk_level: text_field(analysis, &["riskLevel"])
                .map(|s| RiskLevel::parse_lenient(&s))
                .unwrap_or(RiskLevel::Unknown),
            cancer_positive_score: score_field(analysis)?,
            diagnosis_analysis: text_field(analysis, &["diagnosisAnalysis"])
                .unwrap_or_else(|| DEFAULT_DIAGNOSIS.to_string()),
        },
    })
}

fn object_field<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a Map<String, Value>, AnalysisError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(AnalysisError::malformed(format!(
            "`{}` is not an object",
            key
        ))),
        None => Err(AnalysisError::malformed(format!("missing `{}`", key))),
    }
}

/// First non-blank string (or number) among `keys`.
fn text_field(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match map.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn score_field(analysis: &Map<String, Value>) -> Result<f64, AnalysisError> {
    match analysis.get("cancerPositiveScore") {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AnalysisError::malformed("cancerPositiveScore is out of range")),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            AnalysisError::malformed(format!("cancerPositiveScore {:?} is not numeric", s))
        }),
        Some(other) => Err(AnalysisError::malformed(format!(
            "cancerPositiveScore has unexpected type: {}",
            other
        ))),
    }
}
