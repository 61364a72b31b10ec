//! Work-list query: open issues waiting to be investigated.

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use relnotes_shared::{RelnotesError, Result, WorkItem, WorklistConfig};
use tracing::{debug, instrument, warn};

/// Upper bound passed to the issue tracker when no limit is requested.
const UNBOUNDED_LIMIT: usize = 1000;

/// Source of work items.
///
/// Infallible by contract: a query that cannot be answered yields an empty
/// list, which callers report as "no items found".
pub trait WorkList: Send + Sync {
    fn query(
        &self,
        labels: &[String],
        limit: Option<usize>,
    ) -> impl Future<Output = Vec<WorkItem>> + Send;
}

/// `gh issue list` in the current repository.
#[derive(Debug, Clone)]
pub struct GhIssueList {
    command: String,
    timeout_secs: u64,
}

impl GhIssueList {
    pub fn new(config: &WorklistConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout_secs: config.timeout_secs,
        }
    }

    pub fn args(labels: &[String], limit: Option<usize>) -> Vec<String> {
        vec![
            "issue".into(),
            "list".into(),
            "--state".into(),
            "open".into(),
            "--label".into(),
            labels.join(","),
            "--json".into(),
            "number,title".into(),
            "--limit".into(),
            limit.unwrap_or(UNBOUNDED_LIMIT).to_string(),
        ]
    }

    async fn run(&self, labels: &[String], limit: Option<usize>) -> Result<Vec<WorkItem>> {
        let child = tokio::process::Command::new(&self.command)
            .args(Self::args(labels, limit))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child)
            .await
            .map_err(|_| {
                RelnotesError::Oracle(format!(
                    "`{}` did not answer within {}s",
                    self.command, self.timeout_secs
                ))
            })?
            .map_err(|e| RelnotesError::Oracle(format!("failed to run `{}`: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RelnotesError::Oracle(format!(
                "`{}` exited with {:?}: {}",
                self.command,
                output.status.code(),
                stderr.trim()
            )));
        }

        parse_issue_list(&String::from_utf8_lossy(&output.stdout))
    }
}

impl WorkList for GhIssueList {
    #[instrument(skip_all, fields(labels = %labels.join(","), limit = ?limit))]
    async fn query(&self, labels: &[String], limit: Option<usize>) -> Vec<WorkItem> {
        match self.run(labels, limit).await {
            Ok(items) => {
                debug!(count = items.len(), "work list fetched");
                items
            }
            Err(e) => {
                warn!(error = %e, "work list query failed, treating as empty");
                Vec::new()
            }
        }
    }
}

/// Parse the `--json number,title` output.
pub fn parse_issue_list(json: &str) -> Result<Vec<WorkItem>> {
    serde_json::from_str(json)
        .map_err(|e| RelnotesError::parse(format!("invalid issue list JSON: {e}")))
}
