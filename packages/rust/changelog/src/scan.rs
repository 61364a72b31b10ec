//! Line scanner: the running `(category, component)` state and the per-line
//! extraction steps.

use std::sync::LazyLock;

use regex::Regex;
use relnotes_shared::{Category, ChangeItem};

use crate::ExtractOptions;

/// Maximum characters kept in [`ChangeItem::name`].
pub const MAX_NAME_CHARS: usize = 200;

/// Maximum characters kept in [`ChangeItem::description`].
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Cleaned names shorter than this are noise, not changes.
pub const MIN_NAME_CHARS: usize = 5;

/// Header keyword → category, scanned in order; first substring hit wins.
const CATEGORY_KEYWORDS: &[(&str, Category)] = &[
    ("breaking", Category::Breaking),
    ("feature", Category::Feature),
    ("enhancement", Category::Enhancement),
    ("bug fix", Category::Bugfix),
    ("bugfix", Category::Bugfix),
    ("deprecat", Category::Deprecation),
    ("added", Category::Feature),
];

/// Header sub-tokens that mean "the project itself", not a component.
const NON_COMPONENTS: &[&str] = &["core", "build"];

/// Component keyword aliases normalized to their canonical spelling.
const COMPONENT_ALIASES: &[(&str, &str)] = &[("knn", "k-nn")];

// ---------------------------------------------------------------------------
// Regex patterns (compiled once)
// ---------------------------------------------------------------------------

/// `#123` anywhere in the line.
static PR_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\d+)").expect("PR hash regex"));

/// `[123]` or `[#123]`.
static PR_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#?(\d+)\]").expect("PR bracket regex"));

/// `[text](url)`.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("link regex"));

/// `(#123)`.
static PAREN_PR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(#\d+\)").expect("paren PR regex"));

static BARE_PR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\d+").expect("bare PR regex"));

static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*]\s*").expect("list marker regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Known component names mentioned inline in an entry.
static COMPONENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(k-nn|knn|neural-search|ml-commons|sql|security|alerting|anomaly-detection|index-management|observability|reporting|notifications|geospatial|cross-cluster-replication|asynchronous-search)\b",
    )
    .expect("component regex")
});

// ---------------------------------------------------------------------------
// Scan state
// ---------------------------------------------------------------------------

/// Accumulator carried across lines. Only header lines change it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    pub category: Option<Category>,
    /// `None` means "document default".
    pub component: Option<String>,
}

impl ScanState {
    /// Feed one raw line; returns the item it yields, if any.
    pub fn step(&mut self, line: &str, opts: &ExtractOptions) -> Option<ChangeItem> {
        let line = line.trim();

        if line.starts_with('#') {
            self.apply_header(line, opts);
            return None;
        }

        let category = self.category?;
        if !line.starts_with(['-', '*']) {
            return None;
        }

        let pr_reference = find_pr_number(line)?;
        let name = clean_name(line);
        if name.chars().count() < MIN_NAME_CHARS {
            tracing::trace!(line, "dropping entry with too-short name");
            return None;
        }

        let repository = component_keyword(line)
            .or_else(|| self.component.clone())
            .unwrap_or_else(|| opts.default_repository.clone());

        Some(ChangeItem {
            name: truncate_chars(&name, MAX_NAME_CHARS),
            category,
            repository,
            pr_reference,
            description: truncate_chars(&name, MAX_DESCRIPTION_CHARS),
        })
    }

    fn apply_header(&mut self, line: &str, opts: &ExtractOptions) {
        let header = line.trim_start_matches('#').trim().to_lowercase();

        if let Some(category) = classify_header(&header) {
            self.category = Some(category);
        }

        if self.category.is_some() {
            if let Some(caps) = opts.component_header.captures(&header) {
                let token = caps[1].to_string();
                self.component = if NON_COMPONENTS.contains(&token.as_str()) {
                    None
                } else {
                    Some(token)
                };
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-line helpers
// ---------------------------------------------------------------------------

/// First category keyword contained in a (lowercased) header.
pub fn classify_header(header: &str) -> Option<Category> {
    let header = header.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keyword, _)| header.contains(keyword))
        .map(|(_, category)| *category)
}

/// First PR number in the line. Zero or overflowing numbers count as absent.
pub fn find_pr_number(line: &str) -> Option<u64> {
    let caps = PR_HASH_RE
        .captures(line)
        .or_else(|| PR_BRACKET_RE.captures(line))?;
    caps[1].parse::<u64>().ok().filter(|pr| *pr > 0)
}

/// Strip links, PR tokens and the list marker; collapse whitespace.
pub fn clean_name(line: &str) -> String {
    let name = LINK_RE.replace_all(line, "$1");
    let name = PAREN_PR_RE.replace_all(&name, "");
    let name = BARE_PR_RE.replace_all(&name, "");
    let name = LIST_MARKER_RE.replace(&name, "");
    WHITESPACE_RE.replace_all(&name, " ").trim().to_string()
}

/// Component keyword mentioned in the entry text, normalized.
pub fn component_keyword(line: &str) -> Option<String> {
    let lower = line.to_lowercase();
    let found = COMPONENT_RE.captures(&lower)?.get(1)?.as_str();
    let canonical = COMPONENT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == found)
        .map_or(found, |(_, canonical)| *canonical);
    Some(canonical.to_string())
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
