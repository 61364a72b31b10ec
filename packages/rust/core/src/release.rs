//! End-to-end release investigation:
//! fetch → group (all batches) → plan → investigate all → summarize.

use relnotes_shared::Result;
use relnotes_storage::CheckpointStore;
use tracing::{info, instrument};

use crate::fetch::{FetchReleaseConfig, fetch_release};
use crate::grouping::{GroupingConfig, GroupingMode, GroupingReport, run_grouping};
use crate::jobs::{InvestigationConfig, JobRunOutcome, run_batch_investigation};
use crate::oracle::{Oracle, OracleRequest, Workflow, invoke_checked};
use crate::planning::run_planning;
use crate::progress::PipelineProgress;
use crate::prompts;
use crate::worklist::WorkList;

#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub fetch: FetchReleaseConfig,
    pub batch_size: usize,
    /// Work-list selection; its `version` is normally the release itself.
    pub investigation: InvestigationConfig,
}

#[derive(Debug, Clone)]
pub struct ReleaseReport {
    pub items: usize,
    pub groups: usize,
    pub planning_rounds: usize,
    /// Failed investigations are recorded here rather than aborting the run.
    pub investigation: JobRunOutcome,
}

#[instrument(skip_all, fields(version = %config.fetch.version))]
pub async fn investigate_release<O: Oracle, W: WorkList>(
    config: &ReleaseConfig,
    store: &CheckpointStore,
    oracle: &O,
    worklist: &W,
    progress: &dyn PipelineProgress,
) -> Result<ReleaseReport> {
    let version = config.fetch.version.as_str();
    let project = prompts::project_name(&config.fetch.root_name);

    progress.phase("Step 1/5: Fetching release notes");
    let cache = fetch_release(&config.fetch, store, progress).await?;

    progress.phase("Step 2/5: Grouping items");
    let grouping = GroupingConfig {
        version: version.to_string(),
        batch_size: config.batch_size,
        mode: GroupingMode::Drain,
    };
    let groups = match run_grouping(store, oracle, &grouping, progress).await? {
        GroupingReport::Complete { groups, .. } | GroupingReport::Paused { groups, .. } => groups,
    };

    progress.phase("Step 3/5: Creating tracking issues");
    let planning = run_planning(store, oracle, &project, version, None, progress).await?;

    progress.phase("Step 4/5: Investigating issues");
    let investigation = run_batch_investigation(oracle, worklist, &config.investigation, progress).await;

    progress.phase("Step 5/5: Creating release summary");
    let prompt = prompts::summarize(&project, version, config.investigation.options.lang.as_deref());
    invoke_checked(oracle, &OracleRequest::batch(Workflow::Summarize, prompt)).await?;

    info!(
        items = cache.items.len(),
        groups,
        failed = investigation.failure_count(),
        "release investigation complete"
    );
    Ok(ReleaseReport {
        items: cache.items.len(),
        groups,
        planning_rounds: planning.rounds,
        investigation,
    })
}
