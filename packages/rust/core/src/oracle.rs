//! Boundary to the external agent CLI ("the oracle").
//!
//! The pipeline never inspects what the agent does; it hands over a prompt,
//! waits for the exit status and then checks post-conditions on disk. The
//! agent owns the terminal while it runs, so stdio is inherited.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use relnotes_shared::{OracleConfig, RelnotesError, Result};
use tracing::{debug, info, instrument, warn};

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// Agent workflows the pipeline can delegate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workflow {
    GroupRelease,
    ReviewGroups,
    Planner,
    CreateIssues,
    Investigate,
    Explore,
    Summarize,
    Translate,
    GenerateReleaseDocs,
    /// Open-ended session for working on the tool itself.
    Dev,
}

impl Workflow {
    /// Agent name passed with `--agent`.
    pub fn agent_name(&self) -> &'static str {
        match self {
            Self::GroupRelease => "group-release",
            Self::ReviewGroups => "review-groups",
            Self::Planner => "planner",
            Self::CreateIssues => "create-issues",
            Self::Investigate => "investigate",
            Self::Explore => "explore",
            Self::Summarize => "summarize",
            Self::Translate => "translate",
            Self::GenerateReleaseDocs => "generate-release-docs",
            Self::Dev => "dev",
        }
    }
}

impl std::fmt::Display for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.agent_name())
    }
}

/// One oracle invocation.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub workflow: Workflow,
    pub prompt: String,
    /// Leave the agent attached to the user's terminal for a conversation.
    pub interactive: bool,
}

impl OracleRequest {
    /// A non-interactive request, as used by every batch step.
    pub fn batch(workflow: Workflow, prompt: impl Into<String>) -> Self {
        Self {
            workflow,
            prompt: prompt.into(),
            interactive: false,
        }
    }

    pub fn interactive(workflow: Workflow, prompt: impl Into<String>) -> Self {
        Self {
            workflow,
            prompt: prompt.into(),
            interactive: true,
        }
    }
}

/// How an invocation that ran to completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleOutcome {
    Success,
    /// Non-zero exit; `code` is `None` when the process was killed by a signal.
    Failed { code: Option<i32> },
}

impl OracleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// The classification / investigation oracle.
///
/// `Err` means the oracle could not be run at all (spawn failure, timeout);
/// a run that finished unsuccessfully is `Ok(OracleOutcome::Failed)`.
pub trait Oracle: Send + Sync {
    fn invoke(&self, request: &OracleRequest) -> impl Future<Output = Result<OracleOutcome>> + Send;
}

/// Invoke a one-shot workflow and treat a non-zero exit as fatal.
pub async fn invoke_checked<O: Oracle>(oracle: &O, request: &OracleRequest) -> Result<()> {
    match oracle.invoke(request).await? {
        OracleOutcome::Success => Ok(()),
        OracleOutcome::Failed { code } => Err(RelnotesError::OracleFailed {
            workflow: request.workflow.to_string(),
            code,
        }),
    }
}

// ---------------------------------------------------------------------------
// Subprocess oracle
// ---------------------------------------------------------------------------

/// Runs `<command> chat --agent <workflow> ... <prompt>` as a child process.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    config: OracleConfig,
}

impl ProcessOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments for `request` (excluding the executable).
    pub fn args(&self, request: &OracleRequest) -> Vec<String> {
        let mut args = vec![
            "chat".to_string(),
            "--agent".to_string(),
            request.workflow.agent_name().to_string(),
        ];
        if let Some(model) = &self.config.model {
            args.push("--model".to_string());
            args.push(model.clone());
        }
        if self.config.trust_all_tools {
            args.push("--trust-all-tools".to_string());
        }
        if !request.interactive {
            args.push("--no-interactive".to_string());
        }
        if !request.prompt.is_empty() {
            args.push(request.prompt.clone());
        }
        args
    }

    /// Batch steps are bounded; a conversation lasts as long as the user keeps it open.
    pub fn time_limit(&self, request: &OracleRequest) -> Option<Duration> {
        (!request.interactive).then(|| Duration::from_secs(self.config.timeout_secs))
    }
}

impl Oracle for ProcessOracle {
    #[instrument(skip_all, fields(workflow = %request.workflow))]
    async fn invoke(&self, request: &OracleRequest) -> Result<OracleOutcome> {
        let command = &self.config.command;
        info!(cmd = %command, interactive = request.interactive, "starting oracle");
        debug!(prompt = %request.prompt, "oracle prompt");

        let mut child = tokio::process::Command::new(command)
            .args(self.args(request))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RelnotesError::Oracle(format!("failed to spawn `{command}`: {e}. Is it installed?"))
            })?;

        let wait_error =
            |e: std::io::Error| RelnotesError::Oracle(format!("failed to wait for `{command}`: {e}"));

        let status = match self.time_limit(request) {
            None => child.wait().await.map_err(wait_error)?,
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status.map_err(wait_error)?,
                    Err(_) => {
                        let secs = limit.as_secs();
                        warn!(secs, "oracle timed out, killing it");
                        if let Err(e) = child.kill().await {
                            warn!(error = %e, "failed to kill timed-out oracle");
                        }
                        return Err(RelnotesError::OracleTimeout {
                            workflow: request.workflow.to_string(),
                            secs,
                        });
                    }
                }
            }
        };

        if status.success() {
            info!("oracle finished");
            Ok(OracleOutcome::Success)
        } else {
            warn!(code = ?status.code(), "oracle exited unsuccessfully");
            Ok(OracleOutcome::Failed {
                code: status.code(),
            })
        }
    }
}
