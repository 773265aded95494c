//! Runs the external analysis engine as a child process.
//!
//! Each call spawns a fresh process: `<program> <args...> <file>`. Stdout
//! must carry one JSON object; stderr is captured for diagnostics.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as TokioCommand;
use tokio::task::JoinHandle;

use super::result::parse_engine_output;
use super::{AnalysisEngine, AnalysisError, AnalysisResult};
use crate::config::AnalysisConfig;

/// Upper bound on captured stderr carried inside an error.
const MAX_STDERR_BYTES: usize = 4096;

/// How long to keep reading pipes after the process has exited.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

pub struct SubprocessInvoker {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    working_directory: Option<PathBuf>,
    env: HashMap<String, String>,
    runtime: tokio::runtime::Runtime,
}

impl SubprocessInvoker {
    /// Creates an invoker with its own small runtime so synchronous
    /// worker threads can call [`AnalysisEngine::analyze`] directly.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Result<Self, AnalysisError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("reportflow-analysis")
            .enable_all()
            .build()
            .map_err(AnalysisError::Runtime)?;

        Ok(Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(300),
            working_directory: None,
            env: HashMap::new(),
            runtime,
        })
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let mut invoker = Self::new(config.program.clone(), config.args.clone())?
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_env(config.env.clone());
        if let Some(dir) = &config.working_directory {
            invoker = invoker.with_working_directory(dir);
        }
        Ok(invoker)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn run(&self, file_path: &Path) -> Result<AnalysisResult, AnalysisError> {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(&self.args)
            .arg(file_path)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| AnalysisError::Invocation {
            program: self.program.clone(),
            source: e,
        })?;

        tracing::debug!(pid = child.id(), "Analysis engine started");

        let stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                stdout_task.abort();
                stderr_task.abort();
                return Err(AnalysisError::Invocation {
                    program: self.program.clone(),
                    source: e,
                });
            }
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out analysis engine");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(AnalysisError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                });
            }
        };

        let stdout = collect(stdout_task).await;
        let stderr = collect(stderr_task).await;

        if !status.success() {
            return Err(AnalysisError::EngineFailed {
                exit_code: status.code(),
                stderr: truncate_diagnostics(&String::from_utf8_lossy(&stderr), MAX_STDERR_BYTES),
            });
        }

        if !stderr.is_empty() {
            tracing::debug!(bytes = stderr.len(), "Analysis engine wrote diagnostics");
        }

        parse_engine_output(&String::from_utf8_lossy(&stdout))
    }
}

impl AnalysisEngine for SubprocessInvoker {
    fn analyze(&self, file_path: &Path) -> Result<AnalysisResult, AnalysisError> {
        self.runtime.block_on(self.run(file_path))
    }
}

async fn read_pipe<R>(pipe: Option<R>) -> Vec<u8>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            tracing::warn!(error = %e, "Failed reading analysis engine output");
        }
    }
    buf
}

/// Waits briefly for a pipe reader. A grandchild holding the pipe open
/// must not stall the handler.
async fn collect(task: JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(buf)) => buf,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Analysis output reader failed");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("Analysis output still open after engine exit, ignoring remainder");
            Vec::new()
        }
    }
}

/// Keeps the tail of `text`, where tracebacks put the actual error.
fn truncate_diagnostics(text: &str, max_bytes: usize) -> String {
    let text = text.trim();
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    format!("[truncated] {}", &text[start..])
}
