//! Progress reporting hooks for long-running pipeline stages.

use relnotes_shared::WorkItem;

/// Progress callback for reporting pipeline status.
///
/// Called before oracle invocations, so implementations must leave the
/// terminal usable by the time a call returns.
pub trait PipelineProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a source document has been fetched or skipped.
    fn source_fetched(&self, id: &str, ok: bool);
    /// Called before a grouping batch `[start, end)` is delegated.
    fn batch_started(&self, start: usize, end: usize, total: usize);
    /// Called before the `index`-th (1-based) job of `total` runs.
    fn job_started(&self, index: usize, total: usize, item: &WorkItem);
    /// Free-form status line.
    fn note(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_fetched(&self, _id: &str, _ok: bool) {}
    fn batch_started(&self, _start: usize, _end: usize, _total: usize) {}
    fn job_started(&self, _index: usize, _total: usize, _item: &WorkItem) {}
    fn note(&self, _message: &str) {}
}
