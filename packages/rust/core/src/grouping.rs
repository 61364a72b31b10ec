//! Resumable batch grouping.
//!
//! The item list is cut into fixed-size slices starting at the persisted
//! `processed_offset`. Each slice is written to `batch.json` and handed to
//! the group-release agent, which appends groups to `groups.json` and moves
//! the offset forward. After every call the checkpoint is reloaded and the
//! post-conditions are checked:
//!
//! | after the call                        | result                 |
//! |---------------------------------------|------------------------|
//! | non-zero exit                         | `BatchFailed`          |
//! | offset unchanged                      | `StalledBatch`         |
//! | offset past the end, groups rewritten | `MalformedCheckpoint`  |
//!
//! There is no retry and no in-memory cursor, so stopping the process at any
//! point loses at most the batch in flight.

use relnotes_shared::{BatchFile, PipelineCheckpoint, RelnotesError, Result};
use relnotes_storage::CheckpointStore;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::oracle::{Oracle, OracleOutcome, OracleRequest, Workflow};
use crate::progress::PipelineProgress;
use crate::prompts;

/// Whether to stop after one batch or keep going until done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupingMode {
    #[default]
    SingleStep,
    Drain,
}

#[derive(Debug, Clone)]
pub struct GroupingConfig {
    pub version: String,
    pub batch_size: usize,
    pub mode: GroupingMode,
}

/// Where a grouping run stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingReport {
    /// Every item has been classified.
    Complete { total: usize, groups: usize },
    /// A single step finished with items left over.
    Paused { remaining: usize, groups: usize },
}

impl GroupingReport {
    pub fn remaining(&self) -> usize {
        match self {
            Self::Complete { .. } => 0,
            Self::Paused { remaining, .. } => *remaining,
        }
    }
}

/// Run the grouping loop for one release.
#[instrument(skip_all, fields(version = %config.version, batch_size = config.batch_size, run_id = %Uuid::now_v7()))]
pub async fn run_grouping<O: Oracle>(
    store: &CheckpointStore,
    oracle: &O,
    config: &GroupingConfig,
    progress: &dyn PipelineProgress,
) -> Result<GroupingReport> {
    if config.batch_size == 0 {
        return Err(RelnotesError::validation("batch size must be at least 1"));
    }
    let version = config.version.as_str();

    let cache = store.read_item_cache(version)?.ok_or_else(|| {
        RelnotesError::validation(format!(
            "{} not found. Run `relnotes fetch {version}` first.",
            store.item_cache_path(version).display()
        ))
    })?;
    let items = cache.items;
    let total = items.len();

    let mut checkpoint = store.load_or_init(version, &cache.sources, &items)?;
    info!(total, offset = checkpoint.processed_offset, "grouping started");

    loop {
        let offset = checkpoint.processed_offset;
        if offset >= total {
            info!(total, groups = checkpoint.groups.len(), "all items grouped");
            return Ok(GroupingReport::Complete {
                total,
                groups: checkpoint.groups.len(),
            });
        }

        let end = offset.saturating_add(config.batch_size).min(total);
        progress.batch_started(offset, end, total);

        let batch_path = store.write_batch(
            version,
            &BatchFile {
                items: items[offset..end].to_vec(),
                offset,
                total,
            },
        )?;
        let prompt = prompts::group_batch(&batch_path, &store.checkpoint_path(version));

        match oracle
            .invoke(&OracleRequest::batch(Workflow::GroupRelease, prompt))
            .await?
        {
            OracleOutcome::Success => {}
            OracleOutcome::Failed { code } => {
                return Err(RelnotesError::BatchFailed { offset, code });
            }
        }

        checkpoint = verify_advance(store, version, &checkpoint, total, end)?;
        info!(
            offset = checkpoint.processed_offset,
            groups = checkpoint.groups.len(),
            "batch grouped"
        );

        if config.mode == GroupingMode::SingleStep {
            let groups = checkpoint.groups.len();
            return Ok(match checkpoint.remaining() {
                0 => GroupingReport::Complete { total, groups },
                remaining => GroupingReport::Paused { remaining, groups },
            });
        }
    }
}

/// Reload the checkpoint after a successful oracle call and check that it
/// strictly extends `prior` with a forward offset.
fn verify_advance(
    store: &CheckpointStore,
    version: &str,
    prior: &PipelineCheckpoint,
    total: usize,
    expected_end: usize,
) -> Result<PipelineCheckpoint> {
    let path = store.checkpoint_path(version);
    let mut next = store
        .load(version)?
        .ok_or_else(|| RelnotesError::malformed(&path, "checkpoint disappeared during the batch"))?;

    if next.processed_offset > total {
        return Err(RelnotesError::malformed(
            &path,
            format!(
                "processed_offset {} is past the {total} known items",
                next.processed_offset
            ),
        ));
    }
    if let Some(violation) = next.extension_violation(prior) {
        return Err(RelnotesError::malformed(&path, violation));
    }
    if next.processed_offset == prior.processed_offset {
        return Err(RelnotesError::StalledBatch {
            offset: prior.processed_offset,
        });
    }
    if next.processed_offset != expected_end {
        warn!(
            expected = expected_end,
            actual = next.processed_offset,
            "oracle advanced the offset by an unexpected amount"
        );
    }

    // The agent rewrites the whole file and may drop fields it doesn't know.
    if next.total_item_count.is_none() || next.items_digest.is_none() {
        next.total_item_count = next.total_item_count.or(prior.total_item_count);
        next.items_digest = next.items_digest.take().or_else(|| prior.items_digest.clone());
        store.save(version, &next)?;
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;
    use crate::testing::{GroupStep, ScriptedOracle, seed_items, temp_store};
    use relnotes_shared::{FeatureGroup, ItemRef};

    fn config(batch_size: usize, mode: GroupingMode) -> GroupingConfig {
        GroupingConfig {
            version: "3.0.0".into(),
            batch_size,
            mode,
        }
    }

    #[tokio::test]
    async fn resumes_from_persisted_offset() {
        let store = temp_store();
        let items = seed_items(&store, "3.0.0", 120);

        let mut cp = store.load_or_init("3.0.0", &[], &items).unwrap();
        cp.processed_offset = 100;
        cp.groups.push(FeatureGroup::new("Earlier A", vec![ItemRef::new(1)]));
        cp.groups.push(FeatureGroup::new("Earlier B", vec![ItemRef::new(2)]));
        store.save("3.0.0", &cp).unwrap();

        let oracle = ScriptedOracle::new(&store, "3.0.0");
        let report = run_grouping(&store, &oracle, &config(50, GroupingMode::SingleStep), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report, GroupingReport::Complete { total: 120, groups: 3 });
        assert_eq!(report.remaining(), 0);
        assert_eq!(oracle.calls_for(Workflow::GroupRelease), 1);

        let batch: BatchFile =
            serde_json::from_str(&std::fs::read_to_string(store.batch_path("3.0.0")).unwrap())
                .unwrap();
        assert_eq!(batch.offset, 100);
        assert_eq!(batch.total, 120);
        assert_eq!(batch.items.len(), 20);
        assert_eq!(batch.items[0].pr_reference, 101);

        let after = store.load("3.0.0").unwrap().unwrap();
        assert_eq!(after.processed_offset, 120);
        assert_eq!(after.groups[..2], cp.groups[..]);
        assert_eq!(after.groups[2].members.len(), 20);
    }

    #[tokio::test]
    async fn oversized_batch_takes_the_rest() {
        let store = temp_store();
        let items = seed_items(&store, "3.0.0", 120);
        let mut cp = store.load_or_init("3.0.0", &[], &items).unwrap();
        cp.processed_offset = 100;
        store.save("3.0.0", &cp).unwrap();

        let oracle = ScriptedOracle::new(&store, "3.0.0");
        let report = run_grouping(
            &store,
            &oracle,
            &config(usize::MAX, GroupingMode::SingleStep),
            &SilentProgress,
        )
        .await
        .unwrap();

        assert_eq!(report, GroupingReport::Complete { total: 120, groups: 1 });
        assert_eq!(store.load("3.0.0").unwrap().unwrap().processed_offset, 120);
    }

    #[tokio::test]
    async fn single_step_pauses_with_remaining() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 120);
        let oracle = ScriptedOracle::new(&store, "3.0.0");

        let report = run_grouping(&store, &oracle, &config(50, GroupingMode::SingleStep), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report, GroupingReport::Paused { remaining: 70, groups: 1 });
        assert_eq!(oracle.calls().len(), 1);
        assert_eq!(store.load("3.0.0").unwrap().unwrap().processed_offset, 50);
    }

    #[tokio::test]
    async fn drain_processes_every_batch() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 120);
        let oracle = ScriptedOracle::new(&store, "3.0.0");

        let report = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(report, GroupingReport::Complete { total: 120, groups: 3 });
        assert_eq!(oracle.calls_for(Workflow::GroupRelease), 3);

        let cp = store.load("3.0.0").unwrap().unwrap();
        let members: usize = cp.groups.iter().map(|g| g.members.len()).sum();
        assert_eq!(members, 120);
    }

    #[tokio::test]
    async fn complete_checkpoint_makes_no_calls() {
        let store = temp_store();
        let items = seed_items(&store, "3.0.0", 10);
        let mut cp = store.load_or_init("3.0.0", &[], &items).unwrap();
        cp.processed_offset = 10;
        store.save("3.0.0", &cp).unwrap();

        let oracle = ScriptedOracle::new(&store, "3.0.0");
        let report = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap();
        assert_eq!(report, GroupingReport::Complete { total: 10, groups: 0 });
        assert!(oracle.calls().is_empty());
    }

    #[tokio::test]
    async fn success_without_advance_is_a_stall() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 120);
        let oracle = ScriptedOracle::new(&store, "3.0.0").grouping(GroupStep::NoAdvance);

        let err = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, RelnotesError::StalledBatch { offset: 0 }));
        assert_eq!(oracle.calls().len(), 1);
    }

    #[tokio::test]
    async fn oracle_failure_stops_the_loop() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 120);
        let oracle = ScriptedOracle::new(&store, "3.0.0").grouping(GroupStep::Fail(3));

        let err = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            RelnotesError::BatchFailed {
                offset: 0,
                code: Some(3)
            }
        ));
        assert_eq!(oracle.calls().len(), 1);
    }

    #[tokio::test]
    async fn overshoot_and_rewrite_are_malformed() {
        for step in [GroupStep::Overshoot, GroupStep::Rewrite] {
            let store = temp_store();
            let items = seed_items(&store, "3.0.0", 120);
            let mut cp = store.load_or_init("3.0.0", &[], &items).unwrap();
            cp.groups.push(FeatureGroup::new("Seed", vec![ItemRef::new(1)]));
            store.save("3.0.0", &cp).unwrap();

            let oracle = ScriptedOracle::new(&store, "3.0.0").grouping(step);
            let err = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
                .await
                .unwrap_err();
            assert!(
                matches!(err, RelnotesError::MalformedCheckpoint { .. }),
                "{step:?}: {err}"
            );
        }
    }

    #[tokio::test]
    async fn dropped_metadata_is_restored() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 60);
        let oracle = ScriptedOracle::new(&store, "3.0.0");
        run_grouping(&store, &oracle, &config(50, GroupingMode::SingleStep), &SilentProgress)
            .await
            .unwrap();

        // Simulate an agent that rewrites the file without the optional fields.
        let path = store.checkpoint_path("3.0.0");
        let mut raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let obj = raw.as_object_mut().unwrap();
        obj.remove("total_items");
        obj.remove("items_digest");
        std::fs::write(&path, serde_json::to_string(&raw).unwrap()).unwrap();

        run_grouping(&store, &oracle, &config(50, GroupingMode::SingleStep), &SilentProgress)
            .await
            .unwrap();
        let cp = store.load("3.0.0").unwrap().unwrap();
        assert_eq!(cp.total_item_count, Some(60));
        assert!(cp.items_digest.is_some());
    }

    #[tokio::test]
    async fn missing_item_cache_asks_for_fetch() {
        let store = temp_store();
        let oracle = ScriptedOracle::new(&store, "3.0.0");
        let err = run_grouping(&store, &oracle, &config(50, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, RelnotesError::Validation { .. }));
        assert!(err.to_string().contains("relnotes fetch 3.0.0"));
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let store = temp_store();
        seed_items(&store, "3.0.0", 5);
        let oracle = ScriptedOracle::new(&store, "3.0.0");
        let err = run_grouping(&store, &oracle, &config(0, GroupingMode::Drain), &SilentProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, RelnotesError::Validation { .. }));
        assert!(oracle.calls().is_empty());
    }
}
