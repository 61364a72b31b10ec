//! Sequential per-item investigation with failure isolation.
//!
//! Each work item gets exactly one investigate call, in list order. A failed
//! or crashed call marks that item `failed` and the run moves on; the caller
//! gets a summary of every item instead of an error.

use relnotes_shared::WorkItem;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::oracle::{Oracle, OracleOutcome, OracleRequest, Workflow};
use crate::progress::PipelineProgress;
use crate::prompts::{self, InvestigateOptions, InvestigateTarget};
use crate::worklist::WorkList;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Success,
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub item: WorkItem,
    pub status: JobStatus,
}

/// Per-item outcomes in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub results: Vec<JobResult>,
}

impl JobSummary {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == JobStatus::Success)
            .count()
    }

    pub fn failure_count(&self) -> usize {
        self.total() - self.success_count()
    }
}

impl std::fmt::Display for JobSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Success: {}/{}", self.success_count(), self.total())?;
        for r in &self.results {
            writeln!(f, "  #{}: {} - {}", r.item.id, r.status, r.item.title)?;
        }
        Ok(())
    }
}

/// Result of a batch investigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRunOutcome {
    /// The work list was empty; nothing ran.
    NoItems { labels: Vec<String> },
    Completed(JobSummary),
}

impl JobRunOutcome {
    pub fn failure_count(&self) -> usize {
        match self {
            Self::NoItems { .. } => 0,
            Self::Completed(summary) => summary.failure_count(),
        }
    }
}

impl std::fmt::Display for JobRunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoItems { labels } => {
                write!(f, "No open issues found with labels: {}", labels.join(", "))
            }
            Self::Completed(summary) => write!(f, "{summary}"),
        }
    }
}

/// Selection of the work list for [`run_batch_investigation`].
#[derive(Debug, Clone, Default)]
pub struct InvestigationConfig {
    /// Labels every queued issue carries (`status/todo`).
    pub labels: Vec<String>,
    /// Restrict to issues labelled `release/v<version>`.
    pub version: Option<String>,
    /// `None` takes every matching issue.
    pub limit: Option<usize>,
    pub options: InvestigateOptions,
}

impl InvestigationConfig {
    /// Labels passed to the work-list query.
    pub fn query_labels(&self) -> Vec<String> {
        let mut labels = self.labels.clone();
        if let Some(version) = &self.version {
            labels.push(format!("release/v{version}"));
        }
        labels
    }
}

/// Investigate `items` one after another.
#[instrument(skip_all, fields(items = items.len(), run_id = %Uuid::now_v7()))]
pub async fn run_jobs<O: Oracle>(
    oracle: &O,
    items: Vec<WorkItem>,
    options: &InvestigateOptions,
    progress: &dyn PipelineProgress,
) -> JobSummary {
    let total = items.len();
    let mut results = Vec::with_capacity(total);

    for (i, item) in items.into_iter().enumerate() {
        progress.job_started(i + 1, total, &item);

        let prompt = prompts::investigate(&InvestigateTarget::Issue(item.id), options);
        let status = match oracle
            .invoke(&OracleRequest::batch(Workflow::Investigate, prompt))
            .await
        {
            Ok(OracleOutcome::Success) => JobStatus::Success,
            Ok(OracleOutcome::Failed { code }) => {
                warn!(issue = item.id, ?code, "investigation failed");
                JobStatus::Failed
            }
            Err(e) => {
                warn!(issue = item.id, error = %e, "investigation could not run");
                JobStatus::Failed
            }
        };
        info!(issue = item.id, %status, "job finished");
        results.push(JobResult { item, status });
    }

    JobSummary { results }
}

/// Query the work list and investigate whatever it returns.
pub async fn run_batch_investigation<O: Oracle, W: WorkList>(
    oracle: &O,
    worklist: &W,
    config: &InvestigationConfig,
    progress: &dyn PipelineProgress,
) -> JobRunOutcome {
    let labels = config.query_labels();
    let items = worklist.query(&labels, config.limit).await;
    if items.is_empty() {
        info!(labels = %labels.join(","), "no items to investigate");
        return JobRunOutcome::NoItems { labels };
    }
    JobRunOutcome::Completed(run_jobs(oracle, items, &config.options, progress).await)
}
