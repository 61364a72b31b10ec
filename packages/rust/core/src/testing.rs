//! In-process stand-ins for the agent CLI and the issue tracker.

use std::sync::Mutex;

use relnotes_shared::{
    BatchFile, Category, CategorySummary, ChangeItem, FeatureGroup, ItemRef, PipelineCheckpoint,
    RawItemCache, Result, WorkItem,
};
use relnotes_storage::CheckpointStore;
use uuid::Uuid;

use crate::oracle::{Oracle, OracleOutcome, OracleRequest, Workflow};
use crate::worklist::WorkList;

pub(crate) fn temp_store() -> CheckpointStore {
    let tmp = std::env::temp_dir().join(format!("relnotes-core-test-{}", Uuid::now_v7()));
    CheckpointStore::open(tmp).expect("open store")
}

pub(crate) fn items(n: usize) -> Vec<ChangeItem> {
    (1..=n as u64)
        .map(|pr| ChangeItem {
            name: format!("Change number {pr}"),
            category: Category::Enhancement,
            repository: "opensearch".into(),
            pr_reference: pr,
            description: format!("Change number {pr}"),
        })
        .collect()
}

/// Write a raw item cache of `n` items for `version`.
pub(crate) fn seed_items(store: &CheckpointStore, version: &str, n: usize) -> Vec<ChangeItem> {
    let items = items(n);
    store
        .write_item_cache(&RawItemCache {
            version: version.into(),
            parsed_at: chrono::Utc::now(),
            sources: vec!["OpenSearch/notes.md".into()],
            summary: CategorySummary::from_items(&items),
            items: items.clone(),
        })
        .expect("write item cache");
    items
}

/// What the scripted agent does with a grouping batch.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupStep {
    /// One new group per batch, offset advanced past it.
    Classify,
    /// Report success without touching the checkpoint.
    NoAdvance,
    Fail(i32),
    /// Advance past the end of the item list.
    Overshoot,
    /// Advance but drop every existing group.
    Rewrite,
}

/// Agent stand-in that edits the checkpoint file directly, the way the real
/// agent does.
pub(crate) struct ScriptedOracle {
    store: CheckpointStore,
    version: String,
    grouping: GroupStep,
    refs_per_plan: usize,
    failing_issues: Vec<u64>,
    calls: Mutex<Vec<OracleRequest>>,
}

impl ScriptedOracle {
    pub(crate) fn new(store: &CheckpointStore, version: &str) -> Self {
        Self {
            store: store.clone(),
            version: version.into(),
            grouping: GroupStep::Classify,
            refs_per_plan: 20,
            failing_issues: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn grouping(mut self, step: GroupStep) -> Self {
        self.grouping = step;
        self
    }

    pub(crate) fn refs_per_plan(mut self, n: usize) -> Self {
        self.refs_per_plan = n;
        self
    }

    pub(crate) fn failing_issue(mut self, id: u64) -> Self {
        self.failing_issues.push(id);
        self
    }

    pub(crate) fn calls(&self) -> Vec<OracleRequest> {
        self.calls.lock().expect("lock").clone()
    }

    pub(crate) fn calls_for(&self, workflow: Workflow) -> usize {
        self.calls().iter().filter(|r| r.workflow == workflow).count()
    }

    fn read_checkpoint(&self) -> PipelineCheckpoint {
        let raw = std::fs::read_to_string(self.store.checkpoint_path(&self.version))
            .expect("checkpoint exists");
        serde_json::from_str(&raw).expect("checkpoint parses")
    }

    fn write_checkpoint(&self, checkpoint: &PipelineCheckpoint) {
        let json = serde_json::to_string_pretty(checkpoint).expect("serialize");
        std::fs::write(self.store.checkpoint_path(&self.version), json).expect("write checkpoint");
    }

    fn group(&self) -> OracleOutcome {
        let raw = std::fs::read_to_string(self.store.batch_path(&self.version)).expect("batch");
        let batch: BatchFile = serde_json::from_str(&raw).expect("batch parses");
        let mut checkpoint = self.read_checkpoint();
        let end = batch.offset + batch.items.len();

        match self.grouping {
            GroupStep::NoAdvance => return OracleOutcome::Success,
            GroupStep::Fail(code) => return OracleOutcome::Failed { code: Some(code) },
            GroupStep::Overshoot => checkpoint.processed_offset = batch.total + 5,
            GroupStep::Rewrite => {
                checkpoint.groups.clear();
                checkpoint.processed_offset = end;
            }
            GroupStep::Classify => {
                checkpoint.groups.push(FeatureGroup::new(
                    format!("Batch {}", batch.offset),
                    batch.items.iter().map(ItemRef::from).collect(),
                ));
                checkpoint.processed_offset = end;
            }
        }
        self.write_checkpoint(&checkpoint);
        OracleOutcome::Success
    }

    fn plan(&self) -> OracleOutcome {
        let mut checkpoint = self.read_checkpoint();
        let next_ref = checkpoint
            .groups
            .iter()
            .filter_map(|g| g.tracking_ref)
            .max()
            .unwrap_or(1000);
        for (i, group) in checkpoint
            .groups
            .iter_mut()
            .filter(|g| g.tracking_ref.is_none())
            .take(self.refs_per_plan)
            .enumerate()
        {
            group.tracking_ref = Some(next_ref + 1 + i as u64);
        }
        self.write_checkpoint(&checkpoint);
        OracleOutcome::Success
    }
}

impl Oracle for ScriptedOracle {
    async fn invoke(&self, request: &OracleRequest) -> Result<OracleOutcome> {
        self.calls.lock().expect("lock").push(request.clone());
        let outcome = match request.workflow {
            Workflow::GroupRelease => self.group(),
            Workflow::Planner => self.plan(),
            Workflow::Investigate
                if self
                    .failing_issues
                    .iter()
                    .any(|id| request.prompt.contains(&format!("#{id}."))) =>
            {
                OracleOutcome::Failed { code: Some(1) }
            }
            _ => OracleOutcome::Success,
        };
        Ok(outcome)
    }
}

/// Work list answering every query with the same issues.
pub(crate) struct FixedWorkList {
    items: Vec<WorkItem>,
    queries: Mutex<Vec<(Vec<String>, Option<usize>)>>,
}

impl FixedWorkList {
    pub(crate) fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn queries(&self) -> Vec<(Vec<String>, Option<usize>)> {
        self.queries.lock().expect("lock").clone()
    }
}

impl WorkList for FixedWorkList {
    async fn query(&self, labels: &[String], limit: Option<usize>) -> Vec<WorkItem> {
        self.queries
            .lock()
            .expect("lock")
            .push((labels.to_vec(), limit));
        let n = limit.unwrap_or(self.items.len());
        self.items.iter().take(n).cloned().collect()
    }
}

pub(crate) fn issues(ids: &[u64]) -> Vec<WorkItem> {
    ids.iter()
        .map(|&id| WorkItem {
            id,
            title: format!("Investigate feature {id}"),
        })
        .collect()
}
