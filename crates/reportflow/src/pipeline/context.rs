use crate::analysis::AnalysisResult;
use crate::records::{Report, Resolution};
use crate::worker::job::Job;

pub struct PipelineContext {
    // Input
    pub job: Job,

    // Analyze result
    pub analysis: Option<AnalysisResult>,

    // Resolve result
    pub resolution: Option<Resolution>,

    // Write result
    pub report: Option<Report>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            analysis: None,
            resolution: None,
            report: None,
        }
    }
}
