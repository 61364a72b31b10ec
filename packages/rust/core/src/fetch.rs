//! Fetch stage: release-notes documents → extracted items → `raw-items.json`.

use chrono::Utc;
use relnotes_changelog::{ExtractOptions, extract_items};
use relnotes_shared::{
    AppConfig, CategorySummary, RawItemCache, RelnotesError, Result, SourceConfig, github_token,
};
use relnotes_sources::{FetchOptions, SourceDocument, fetch_documents};
use relnotes_storage::CheckpointStore;
use tracing::{info, instrument};

use crate::progress::PipelineProgress;

/// Configuration for [`fetch_release`].
#[derive(Debug, Clone)]
pub struct FetchReleaseConfig {
    pub version: String,
    pub http: FetchOptions,
    pub sources: Vec<SourceConfig>,
    /// Project prefix recognised in component headers.
    pub root_name: String,
}

impl FetchReleaseConfig {
    /// Build from the loaded app config, reading the API token from the env.
    pub fn from_app(config: &AppConfig, version: impl Into<String>) -> Self {
        let mut http = FetchOptions::new(config.github.api_base.clone());
        http.token = github_token(config);
        http.timeout_secs = config.github.timeout_secs;
        Self {
            version: version.into(),
            http,
            sources: config.sources.clone(),
            root_name: config.github.root_name.clone(),
        }
    }
}

/// Fetch every source for the release, extract its items and persist the
/// raw item cache.
///
/// Unavailable sources are skipped; fetching nothing at all is an error
/// since there would be nothing to group.
#[instrument(skip_all, fields(version = %config.version))]
pub async fn fetch_release(
    config: &FetchReleaseConfig,
    store: &CheckpointStore,
    progress: &dyn PipelineProgress,
) -> Result<RawItemCache> {
    progress.phase(&format!("Fetching release notes for v{}", config.version));
    let fetched = fetch_documents(&config.http, &config.sources, &config.version).await?;

    for doc in &fetched.documents {
        progress.source_fetched(&doc.id, true);
    }
    for failure in &fetched.failures {
        progress.source_fetched(&failure.id, false);
    }

    if fetched.documents.is_empty() {
        return Err(RelnotesError::validation(format!(
            "no release notes found for v{} ({} sources tried)",
            config.version,
            fetched.failures.len()
        )));
    }

    progress.phase("Extracting change items");
    let cache = build_item_cache(&config.version, &fetched.documents, &config.root_name)?;
    store.write_item_cache(&cache)?;

    info!(
        items = cache.items.len(),
        sources = cache.sources.len(),
        "release notes fetched"
    );
    Ok(cache)
}

/// Extract items from each document in order and summarise them.
pub fn build_item_cache(
    version: &str,
    documents: &[SourceDocument],
    root_name: &str,
) -> Result<RawItemCache> {
    let mut items = Vec::new();
    for doc in documents {
        let opts = ExtractOptions::for_repository(root_name, &doc.repo)?;
        let before = items.len();
        items.extend(extract_items(&doc.content, &opts));
        info!(source = %doc.id, items = items.len() - before, "extracted items");
    }

    Ok(RawItemCache {
        version: version.to_string(),
        parsed_at: Utc::now(),
        sources: documents.iter().map(|d| d.id.clone()).collect(),
        summary: CategorySummary::from_items(&items),
        items,
    })
}
