//! Pipeline orchestration and domain logic for relnotes.
//!
//! This crate ties together source fetching, item extraction, the checkpoint
//! store and the external agent CLI into end-to-end workflows: fetch a
//! release, group its items in resumable batches, plan tracking issues and
//! investigate them one by one.

pub mod fetch;
pub mod grouping;
pub mod jobs;
pub mod oracle;
pub mod planning;
pub mod progress;
pub mod prompts;
pub mod release;
pub mod worklist;

#[cfg(test)]
pub(crate) mod testing;
