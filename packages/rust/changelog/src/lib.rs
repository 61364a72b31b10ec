//! Changelog item extraction.
//!
//! Turns one release-notes markdown document into an ordered sequence of
//! [`ChangeItem`]s. The document is read line by line:
//! - `#`-prefixed headers set the running category (`### Bug Fixes`) and,
//!   for headers like `## OpenSearch k-NN`, the running component
//! - `-` / `*` list entries under a category become items when they carry a
//!   PR number (`#123` or `[123]`) and a non-trivial description
//!
//! Extraction is a pure function of the text and [`ExtractOptions`]; calling
//! it twice on the same input yields the same sequence.

mod scan;

use regex::Regex;
use relnotes_shared::{ChangeItem, RelnotesError, Result};

pub use scan::{
    MAX_DESCRIPTION_CHARS, MAX_NAME_CHARS, MIN_NAME_CHARS, ScanState, classify_header,
    clean_name, component_keyword, find_pr_number,
};

/// Per-document extraction settings.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Repository recorded when neither the line nor a header names a component.
    pub default_repository: String,
    /// Matches `<root> <component>` in a lowercased header.
    component_header: Regex,
}

impl ExtractOptions {
    /// Build options for documents of the project `root_name` (e.g. `opensearch`).
    pub fn new(root_name: &str, default_repository: impl Into<String>) -> Result<Self> {
        let pattern = format!(
            r"(?i){}[- ](\w+)",
            regex::escape(&root_name.to_lowercase())
        );
        let component_header = Regex::new(&pattern)
            .map_err(|e| RelnotesError::parse(format!("invalid component pattern: {e}")))?;
        Ok(Self {
            default_repository: default_repository.into(),
            component_header,
        })
    }

    /// Options for a document published by `repo`, using its default component.
    pub fn for_repository(root_name: &str, repo: &str) -> Result<Self> {
        Self::new(root_name, default_repository_for(root_name, repo))
    }
}

/// Default component for a source repository: the project root and its build
/// repo map to the root, everything else to its own lowercase name.
pub fn default_repository_for(root_name: &str, repo: &str) -> String {
    let root = root_name.to_lowercase();
    let repo = repo.to_lowercase();
    if repo == root || repo == format!("{root}-build") {
        root
    } else {
        repo
    }
}

/// Lazily extract change items from one changelog document.
///
/// The returned iterator is finite and `Clone`; each clone replays the
/// document from its current position with its own scan state.
pub fn extract_items<'a>(
    text: &'a str,
    opts: &'a ExtractOptions,
) -> impl Iterator<Item = ChangeItem> + Clone + 'a {
    text.lines()
        .scan(ScanState::default(), move |state, line| {
            Some(state.step(line, opts))
        })
        .flatten()
}
