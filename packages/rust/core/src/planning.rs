//! Planning loop: give every feature group a tracking issue.
//!
//! The planner agent creates a bounded number of issues per call and writes
//! their numbers back into `groups.json`. It is invoked until no group is
//! left without one. A round that succeeds without reducing the pending
//! count is reported as a stall instead of being retried forever.

use relnotes_shared::{RelnotesError, Result};
use relnotes_storage::CheckpointStore;
use tracing::{info, instrument};

use crate::oracle::{Oracle, OracleOutcome, OracleRequest, Workflow};
use crate::progress::PipelineProgress;
use crate::prompts;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanningReport {
    /// Planner calls made in this run.
    pub rounds: usize,
    pub groups: usize,
}

#[instrument(skip_all, fields(version = %version))]
pub async fn run_planning<O: Oracle>(
    store: &CheckpointStore,
    oracle: &O,
    project: &str,
    version: &str,
    lang: Option<&str>,
    progress: &dyn PipelineProgress,
) -> Result<PlanningReport> {
    let path = store.checkpoint_path(version);
    let mut checkpoint = store.load(version)?.ok_or_else(|| {
        RelnotesError::validation(format!(
            "{} not found. Run `relnotes group {version}` first.",
            path.display()
        ))
    })?;

    let mut pending = checkpoint.pending_tracking();
    let mut rounds = 0;

    while pending > 0 {
        progress.note(&format!("{pending} groups without a tracking issue"));
        let request = OracleRequest::batch(Workflow::Planner, prompts::planner(project, version, &path, lang));
        if let OracleOutcome::Failed { code } = oracle.invoke(&request).await? {
            return Err(RelnotesError::OracleFailed {
                workflow: Workflow::Planner.to_string(),
                code,
            });
        }
        rounds += 1;

        let next = store
            .load(version)?
            .ok_or_else(|| RelnotesError::malformed(&path, "checkpoint disappeared during planning"))?;
        if let Some(violation) = next.extension_violation(&checkpoint) {
            return Err(RelnotesError::malformed(&path, violation));
        }

        let now = next.pending_tracking();
        if now >= pending {
            return Err(RelnotesError::StalledPlanning { pending: now });
        }
        info!(round = rounds, pending = now, "planning round finished");
        pending = now;
        checkpoint = next;
    }

    Ok(PlanningReport {
        rounds,
        groups: checkpoint.groups.len(),
    })
}
