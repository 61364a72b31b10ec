//! Core domain types for relnotes: change items, feature groups, checkpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Kind of change, inferred from the enclosing changelog section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Breaking,
    Feature,
    Enhancement,
    Bugfix,
    Deprecation,
}

impl Category {
    /// All categories in summary order.
    pub const ALL: [Category; 5] = [
        Category::Breaking,
        Category::Feature,
        Category::Enhancement,
        Category::Bugfix,
        Category::Deprecation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breaking => "breaking",
            Self::Feature => "feature",
            Self::Enhancement => "enhancement",
            Self::Bugfix => "bugfix",
            Self::Deprecation => "deprecation",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ChangeItem
// ---------------------------------------------------------------------------

/// One parsed changelog entry. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    /// Cleaned display text, truncated for listing.
    pub name: String,
    pub category: Category,
    /// Originating component (e.g. `opensearch`, `k-nn`).
    pub repository: String,
    /// Pull-request number; always positive.
    #[serde(rename = "pr")]
    pub pr_reference: u64,
    /// Same cleaned text with a longer truncation limit.
    #[serde(default)]
    pub description: String,
}

/// Per-category item counts stored alongside the raw item cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub total: usize,
    pub breaking: usize,
    pub feature: usize,
    pub enhancement: usize,
    pub bugfix: usize,
    pub deprecation: usize,
}

impl CategorySummary {
    /// Count items per category.
    pub fn from_items(items: &[ChangeItem]) -> Self {
        let mut summary = Self {
            total: items.len(),
            ..Default::default()
        };
        for item in items {
            *summary.count_mut(item.category) += 1;
        }
        summary
    }

    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::Breaking => self.breaking,
            Category::Feature => self.feature,
            Category::Enhancement => self.enhancement,
            Category::Bugfix => self.bugfix,
            Category::Deprecation => self.deprecation,
        }
    }

    fn count_mut(&mut self, category: Category) -> &mut usize {
        match category {
            Category::Breaking => &mut self.breaking,
            Category::Feature => &mut self.feature,
            Category::Enhancement => &mut self.enhancement,
            Category::Bugfix => &mut self.bugfix,
            Category::Deprecation => &mut self.deprecation,
        }
    }
}

/// The `raw-items.json` document: every item extracted for one release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItemCache {
    pub version: String,
    pub parsed_at: DateTime<Utc>,
    /// Identifiers of the documents that were fetched (`<repo>/<path>`).
    pub sources: Vec<String>,
    pub summary: CategorySummary,
    pub items: Vec<ChangeItem>,
}

/// The `batch.json` document handed to the oracle for one grouping step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFile {
    pub items: Vec<ChangeItem>,
    /// Absolute index of `items[0]` in the full item list.
    pub offset: usize,
    /// Length of the full item list.
    pub total: usize,
}

// ---------------------------------------------------------------------------
// FeatureGroup
// ---------------------------------------------------------------------------

/// Reference from a group to one of its member change items.
///
/// Agents write members either as objects (`{"pr": 16233, ...}`) or as bare
/// PR numbers; both forms deserialize, and serialization always uses the
/// object form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ItemRefRepr")]
pub struct ItemRef {
    pub pr: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Anything else the oracle recorded about the member.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRef {
    pub fn new(pr: u64) -> Self {
        Self {
            pr,
            repository: None,
            name: None,
            extra: Map::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ItemRefRepr {
    Bare(u64),
    Detailed {
        #[serde(alias = "pr_number", alias = "pr_reference")]
        pr: u64,
        #[serde(default)]
        repository: Option<String>,
        #[serde(default)]
        name: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
}

impl From<ItemRefRepr> for ItemRef {
    fn from(repr: ItemRefRepr) -> Self {
        match repr {
            ItemRefRepr::Bare(pr) => Self::new(pr),
            ItemRefRepr::Detailed {
                pr,
                repository,
                name,
                extra,
            } => Self {
                pr,
                repository,
                name,
                extra,
            },
        }
    }
}

impl From<&ChangeItem> for ItemRef {
    fn from(item: &ChangeItem) -> Self {
        Self {
            pr: item.pr_reference,
            repository: Some(item.repository.clone()),
            name: Some(item.name.clone()),
            extra: Map::new(),
        }
    }
}

/// A cluster of related change items.
///
/// Serialized with the field names the oracle agents read and write
/// (`name`, `items`, `issue_number`); the descriptive names are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGroup {
    #[serde(rename = "name", alias = "label")]
    pub label: String,
    #[serde(rename = "items", alias = "member_item_refs", default)]
    pub members: Vec<ItemRef>,
    #[serde(
        rename = "issue_number",
        alias = "tracking_ref",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tracking_ref: Option<u64>,
    /// Oracle-written fields (category, description, ...) kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FeatureGroup {
    pub fn new(label: impl Into<String>, members: Vec<ItemRef>) -> Self {
        Self {
            label: label.into(),
            members,
            tracking_ref: None,
            extra: Map::new(),
        }
    }

    /// Describe why `self` is not a legal successor of `prior`, if it isn't.
    ///
    /// A group may only gain members or gain a tracking ref.
    pub fn extension_violation(&self, prior: &FeatureGroup) -> Option<String> {
        if self.label != prior.label {
            return Some(format!(
                "group '{}' was relabelled to '{}'",
                prior.label, self.label
            ));
        }
        if self.members.len() < prior.members.len()
            || self.members[..prior.members.len()]
                .iter()
                .zip(&prior.members)
                .any(|(now, before)| now.pr != before.pr)
        {
            return Some(format!("group '{}' lost or reordered members", prior.label));
        }
        if prior.tracking_ref.is_some() && self.tracking_ref != prior.tracking_ref {
            return Some(format!(
                "group '{}' tracking ref changed from {:?} to {:?}",
                prior.label, prior.tracking_ref, self.tracking_ref
            ));
        }
        None
    }
}

// ---------------------------------------------------------------------------
// PipelineCheckpoint
// ---------------------------------------------------------------------------

/// Durable cursor over the ordered item list of one release (`groups.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheckpoint {
    pub version: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub groups: Vec<FeatureGroup>,
    /// Index of the next unprocessed item.
    #[serde(default)]
    pub processed_offset: usize,
    /// Length of the item list this checkpoint was created over.
    #[serde(rename = "total_items", default, skip_serializing_if = "Option::is_none")]
    pub total_item_count: Option<usize>,
    /// SHA-256 of the serialized item list at creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_digest: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineCheckpoint {
    /// A fresh checkpoint with nothing processed.
    pub fn new(version: impl Into<String>, sources: Vec<String>, total_item_count: usize) -> Self {
        Self {
            version: version.into(),
            sources,
            groups: Vec::new(),
            processed_offset: 0,
            total_item_count: Some(total_item_count),
            items_digest: None,
            extra: Map::new(),
        }
    }

    /// Total item count, or zero if the checkpoint predates the field.
    pub fn total(&self) -> usize {
        self.total_item_count.unwrap_or(0)
    }

    /// Items not yet handed to the oracle.
    pub fn remaining(&self) -> usize {
        self.total().saturating_sub(self.processed_offset)
    }

    pub fn is_done(&self) -> bool {
        self.processed_offset >= self.total()
    }

    /// Groups still waiting for a tracking ref.
    pub fn pending_tracking(&self) -> usize {
        self.groups.iter().filter(|g| g.tracking_ref.is_none()).count()
    }

    /// Describe why `self` is not a strict extension of `prior`, if it isn't.
    pub fn extension_violation(&self, prior: &PipelineCheckpoint) -> Option<String> {
        if self.processed_offset < prior.processed_offset {
            return Some(format!(
                "processed_offset went backwards ({} -> {})",
                prior.processed_offset, self.processed_offset
            ));
        }
        if self.groups.len() < prior.groups.len() {
            return Some(format!(
                "group list shrank ({} -> {})",
                prior.groups.len(),
                self.groups.len()
            ));
        }
        self.groups
            .iter()
            .zip(&prior.groups)
            .find_map(|(now, before)| now.extension_violation(before))
    }
}

// ---------------------------------------------------------------------------
// WorkItem
// ---------------------------------------------------------------------------

/// One entry of the external work list (an open issue).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    #[serde(alias = "number")]
    pub id: u64,
    pub title: String,
}
