//! Release-notes document fetching.
//!
//! Each configured source names a markdown file inside a repository
//! (`release-notes/opensearch.release-notes-{version}.md`). Documents are
//! fetched one after another from the code-hosting contents API. A source that
//! cannot be fetched is logged and skipped; it never aborts the others.

use std::time::Duration;

use relnotes_shared::{RelnotesError, Result, SourceConfig};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("relnotes/", env!("CARGO_PKG_VERSION"));

/// Media type asking the contents API for the raw file body.
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Default timeout in seconds per document.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// HTTP settings for fetching documents.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// API root, e.g. `https://api.github.com`.
    pub api_base: Url,
    /// Bearer token, if any.
    pub token: Option<String>,
    pub timeout_secs: u64,
}

impl FetchOptions {
    pub fn new(api_base: Url) -> Self {
        Self {
            api_base,
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// One successfully fetched changelog document.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// `<repo>/<path>`, recorded in the item cache's `sources`.
    pub id: String,
    /// Repository the document came from (drives the default component).
    pub repo: String,
    pub content: String,
}

/// A source that could not be fetched.
#[derive(Debug, Clone)]
pub struct SourceFailure {
    pub id: String,
    pub error: String,
}

/// Outcome of fetching every source for one release.
#[derive(Debug, Clone, Default)]
pub struct FetchedRelease {
    pub documents: Vec<SourceDocument>,
    pub failures: Vec<SourceFailure>,
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Fetch every source's release-notes document for `version`, in order.
///
/// Only a client construction failure is an error; per-source failures are
/// collected in [`FetchedRelease::failures`].
#[instrument(skip_all, fields(version = %version, sources = sources.len()))]
pub async fn fetch_documents(
    opts: &FetchOptions,
    sources: &[SourceConfig],
    version: &str,
) -> Result<FetchedRelease> {
    let client = build_client(opts)?;
    let mut fetched = FetchedRelease::default();

    for source in sources {
        let path = source_path(source, version);
        let id = format!("{}/{}", source.repo, path);

        let result = match contents_url(&opts.api_base, source, &path) {
            Ok(url) => fetch_document(&client, &url, opts.token.as_deref()).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(content) => {
                info!(%id, bytes = content.len(), "fetched release notes");
                fetched.documents.push(SourceDocument {
                    id,
                    repo: source.repo.clone(),
                    content,
                });
            }
            Err(e) => {
                warn!(%id, error = %e, "source unavailable, skipping");
                fetched.failures.push(SourceFailure {
                    id,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(fetched)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Substitute the release version into a source's path template.
pub fn source_path(source: &SourceConfig, version: &str) -> String {
    source.path_template.replace("{version}", version)
}

/// Build `<api_base>/repos/<owner>/<repo>/contents/<path>`, keeping any
/// path prefix the base already has (enterprise installs use `/api/v3`).
fn contents_url(api_base: &Url, source: &SourceConfig, path: &str) -> Result<Url> {
    let base = api_base.as_str().trim_end_matches('/');
    let raw = format!(
        "{base}/repos/{}/{}/contents/{}",
        source.owner,
        source.repo,
        path.trim_start_matches('/')
    );
    Url::parse(&raw).map_err(|e| RelnotesError::validation(format!("invalid source URL {raw}: {e}")))
}

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &FetchOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| RelnotesError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fetch one document body.
async fn fetch_document(client: &Client, url: &Url, token: Option<&str>) -> Result<String> {
    let mut request = client
        .get(url.as_str())
        .header(reqwest::header::ACCEPT, RAW_MEDIA_TYPE);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| RelnotesError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelnotesError::Network(format!("{url}: HTTP {status}")));
    }

    let body = response
        .text()
        .await
        .map_err(|e| RelnotesError::Network(format!("{url}: failed to read body: {e}")))?;

    debug!(%url, bytes = body.len(), "document body received");
    Ok(body)
}
