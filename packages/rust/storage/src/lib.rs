//! File-backed checkpoint store for the release pipeline.
//!
//! Every release version owns a directory under the cache root:
//!
//! ```text
//! <root>/v<version>/
//! ├── raw-items.json   (extracted items, written by the fetch stage)
//! ├── groups.json      (pipeline checkpoint: offset + feature groups)
//! └── batch.json       (the slice currently handed to the oracle)
//! ```
//!
//! **Access rules:** one writer per version at a time. The store itself only
//! ever persists strict extensions of the checkpoint on disk; the oracle
//! appends to `groups.json` out-of-band between our reads.

mod json_file;

use std::path::{Path, PathBuf};

use relnotes_shared::{BatchFile, ChangeItem, PipelineCheckpoint, RawItemCache, RelnotesError, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use json_file::{read_optional, write_json_atomic};

const ITEM_CACHE_FILE: &str = "raw-items.json";
const CHECKPOINT_FILE: &str = "groups.json";
const BATCH_FILE: &str = "batch.json";

/// SHA-256 over the serialized item list, used to pin a checkpoint to it.
pub fn items_digest(items: &[ChangeItem]) -> String {
    let mut hasher = Sha256::new();
    for item in items {
        // Serializing a plain struct cannot fail.
        let json = serde_json::to_vec(item).unwrap_or_default();
        hasher.update(&json);
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

/// Handle to the per-release cache directory tree.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    root: PathBuf,
}

impl CheckpointStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| RelnotesError::io(&root, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/v<version>`.
    pub fn release_dir(&self, version: &str) -> PathBuf {
        self.root.join(format!("v{version}"))
    }

    pub fn checkpoint_path(&self, version: &str) -> PathBuf {
        self.release_dir(version).join(CHECKPOINT_FILE)
    }

    pub fn item_cache_path(&self, version: &str) -> PathBuf {
        self.release_dir(version).join(ITEM_CACHE_FILE)
    }

    pub fn batch_path(&self, version: &str) -> PathBuf {
        self.release_dir(version).join(BATCH_FILE)
    }

    // -----------------------------------------------------------------------
    // Checkpoint
    // -----------------------------------------------------------------------

    /// Load the checkpoint for `version`; `None` when none was saved yet.
    ///
    /// A file that exists but cannot be parsed, belongs to another version,
    /// or has an offset past its own total is malformed. It is never repaired.
    pub fn load(&self, version: &str) -> Result<Option<PipelineCheckpoint>> {
        let path = self.checkpoint_path(version);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };

        let checkpoint: PipelineCheckpoint = serde_json::from_str(&content)
            .map_err(|e| RelnotesError::malformed(&path, e.to_string()))?;

        if checkpoint.version != version {
            return Err(RelnotesError::malformed(
                &path,
                format!("belongs to version {}, expected {version}", checkpoint.version),
            ));
        }
        if let Some(total) = checkpoint.total_item_count {
            if checkpoint.processed_offset > total {
                return Err(RelnotesError::malformed(
                    &path,
                    format!(
                        "processed_offset {} exceeds total_items {total}",
                        checkpoint.processed_offset
                    ),
                ));
            }
        }

        debug!(
            version,
            offset = checkpoint.processed_offset,
            groups = checkpoint.groups.len(),
            "checkpoint loaded"
        );
        Ok(Some(checkpoint))
    }

    /// Load the checkpoint and pin it to `items`, creating a fresh one when
    /// absent.
    ///
    /// A fresh checkpoint (offset 0, no groups, total = `items.len()`) is
    /// persisted immediately so the oracle has a file to append to. An
    /// existing one must match the item list it was created over; missing
    /// `total_items` / `items_digest` fields are filled in and saved.
    #[instrument(skip_all, fields(version = %version, items = items.len()))]
    pub fn load_or_init(
        &self,
        version: &str,
        sources: &[String],
        items: &[ChangeItem],
    ) -> Result<PipelineCheckpoint> {
        let digest = items_digest(items);
        let path = self.checkpoint_path(version);

        let Some(mut checkpoint) = self.load(version)? else {
            let mut fresh = PipelineCheckpoint::new(version, sources.to_vec(), items.len());
            fresh.items_digest = Some(digest);
            self.save(version, &fresh)?;
            info!(total = items.len(), "initialized checkpoint");
            return Ok(fresh);
        };

        if let Some(total) = checkpoint.total_item_count {
            if total != items.len() {
                return Err(RelnotesError::malformed(
                    &path,
                    format!(
                        "created over {total} items but the item list now has {}",
                        items.len()
                    ),
                ));
            }
        }
        if let Some(recorded) = &checkpoint.items_digest {
            if *recorded != digest {
                return Err(RelnotesError::malformed(
                    &path,
                    "item list changed since the checkpoint was created",
                ));
            }
        }
        if checkpoint.processed_offset > items.len() {
            return Err(RelnotesError::malformed(
                &path,
                format!(
                    "processed_offset {} exceeds the {} known items",
                    checkpoint.processed_offset,
                    items.len()
                ),
            ));
        }

        if checkpoint.total_item_count.is_none() || checkpoint.items_digest.is_none() {
            checkpoint.total_item_count = Some(items.len());
            checkpoint.items_digest = Some(digest);
            self.save(version, &checkpoint)?;
            debug!("backfilled checkpoint total and digest");
        }

        Ok(checkpoint)
    }

    /// Persist `checkpoint`, refusing anything that is not a strict extension
    /// of what is currently on disk.
    pub fn save(&self, version: &str, checkpoint: &PipelineCheckpoint) -> Result<()> {
        if checkpoint.version != version {
            return Err(RelnotesError::validation(format!(
                "checkpoint for version {} cannot be saved under {version}",
                checkpoint.version
            )));
        }
        if let Some(total) = checkpoint.total_item_count {
            if checkpoint.processed_offset > total {
                return Err(RelnotesError::validation(format!(
                    "processed_offset {} exceeds total_items {total}",
                    checkpoint.processed_offset
                )));
            }
        }

        if let Some(prior) = self.load(version)? {
            if let Some(violation) = checkpoint.extension_violation(&prior) {
                return Err(RelnotesError::validation(format!(
                    "refusing to overwrite checkpoint: {violation}"
                )));
            }
        }

        write_json_atomic(&self.checkpoint_path(version), checkpoint)?;
        debug!(
            version,
            offset = checkpoint.processed_offset,
            groups = checkpoint.groups.len(),
            "checkpoint saved"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batch + raw item cache
    // -----------------------------------------------------------------------

    /// Write the slice handed to the oracle. Returns the file path.
    pub fn write_batch(&self, version: &str, batch: &BatchFile) -> Result<PathBuf> {
        let path = self.batch_path(version);
        write_json_atomic(&path, batch)?;
        Ok(path)
    }

    /// Read `raw-items.json`; `None` when the release was never fetched.
    pub fn read_item_cache(&self, version: &str) -> Result<Option<RawItemCache>> {
        let path = self.item_cache_path(version);
        let Some(content) = read_optional(&path)? else {
            return Ok(None);
        };
        let cache = serde_json::from_str(&content).map_err(|e| {
            RelnotesError::validation(format!("invalid {}: {e}", path.display()))
        })?;
        Ok(Some(cache))
    }

    /// Write `raw-items.json` for the cache's version. Returns the file path.
    pub fn write_item_cache(&self, cache: &RawItemCache) -> Result<PathBuf> {
        let path = self.item_cache_path(&cache.version);
        write_json_atomic(&path, cache)?;
        info!(path = %path.display(), items = cache.items.len(), "wrote raw item cache");
        Ok(path)
    }
}
