//! Natural-language instructions handed to each agent workflow.
//!
//! Pure string builders; file paths are passed in so the agent reads and
//! writes exactly the files the checkpoint store manages.

use std::path::Path;

/// Where an investigation report is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// Branch, pull request and auto-merge.
    #[default]
    PullRequest,
    /// Commit straight to the main branch.
    PushToMain,
}

/// Options shared by investigation prompts.
#[derive(Debug, Clone, Default)]
pub struct InvestigateOptions {
    pub publish: PublishMode,
    pub overwrite: bool,
    /// Output language code (e.g. `ja`).
    pub lang: Option<String>,
}

/// What an investigation starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvestigateTarget {
    Issue(u64),
    Feature { name: String, pr: Option<u64> },
    /// Let the agent pick the oldest open feature issue.
    OldestOpen,
}

/// What a translation covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranslateTarget {
    /// One feature report under `docs/features/`.
    Feature(String),
    /// Every report of a release under `docs/releases/v<version>/`.
    Release(String),
}

fn language(lang: Option<&str>) -> String {
    lang.map(|l| format!(" Output in language code '{l}'."))
        .unwrap_or_default()
}

fn publish(mode: PublishMode) -> &'static str {
    match mode {
        PublishMode::PullRequest => " Use PR workflow (create branch, pull request, and auto-merge).",
        PublishMode::PushToMain => " Push directly to main.",
    }
}

pub fn group_batch(batch_file: &Path, checkpoint_file: &Path) -> String {
    format!(
        "Group the items in {} into feature groups. Append results to {} and advance processed_offset past this batch.",
        batch_file.display(),
        checkpoint_file.display()
    )
}

pub fn review_groups(checkpoint_file: &Path) -> String {
    format!(
        "Review {}. Look for groups with items that have different [Feature Name] prefixes and split them into separate groups. \
         For example, k-NN Plugin group may contain [Lucene On Faiss], [Remote Vector Index Build], [Explain API Support] items that should be separate groups.",
        checkpoint_file.display()
    )
}

/// Prompt for one planning round; the agent creates at most 20 issues per call.
pub fn planner(project: &str, version: &str, checkpoint_file: &Path, lang: Option<&str>) -> String {
    format!(
        "Create GitHub Project and Issues for {project} v{version} from {}. Create max 20 Issues per run. Resume from where left off.{}",
        checkpoint_file.display(),
        language(lang)
    )
}

pub fn create_issues(tracking: u64, limit: Option<usize>, category: Option<&str>) -> String {
    let mut prompt = format!("Create investigation Issues from tracking Issue #{tracking}.");
    if let Some(limit) = limit {
        prompt.push_str(&format!(" Create only {limit} Issues."));
    }
    if let Some(category) = category {
        prompt.push_str(&format!(" Only create Issues for category: {category}."));
    }
    prompt
}

pub fn investigate(target: &InvestigateTarget, opts: &InvestigateOptions) -> String {
    let mut prompt = match target {
        InvestigateTarget::Issue(number) => format!("Investigate GitHub Issue #{number}."),
        InvestigateTarget::Feature { name, pr } => {
            let start = pr.map(|pr| format!(" starting from PR #{pr}")).unwrap_or_default();
            format!("Investigate feature \"{name}\"{start}.")
        }
        InvestigateTarget::OldestOpen => {
            "Find the oldest open Issue with label 'new-feature' or 'update-feature' and investigate it."
                .to_string()
        }
    };
    prompt.push_str(publish(opts.publish));
    if opts.overwrite {
        prompt.push_str(" Overwrite existing reports.");
    }
    prompt.push_str(&language(opts.lang.as_deref()));
    prompt
}

/// Exploration always names a language; English unless told otherwise.
pub fn explore(feature: &str, lang: Option<&str>) -> String {
    format!(
        "Explore the \"{feature}\" feature in language code \"{}\"",
        lang.unwrap_or("en")
    )
}

pub fn summarize(project: &str, version: &str, lang: Option<&str>) -> String {
    format!(
        "Create release summary for {project} v{version}.{}",
        language(lang)
    )
}

/// English output keeps the plain `.md` name; other languages get `.<lang>.md`.
pub fn translate(target: &TranslateTarget, to: &str) -> String {
    match target {
        TranslateTarget::Feature(name) => {
            let suffix = if to == "en" {
                ".md".to_string()
            } else {
                format!(".{to}.md")
            };
            format!(
                "Translate \"docs/features/{name}.md\" to \"{to}\". Save as \"docs/features/{name}{suffix}\""
            )
        }
        TranslateTarget::Release(version) => {
            format!("Translate reports in \"docs/releases/v{version}/\" to \"{to}\".")
        }
    }
}

pub fn generate_release_docs(version: &str, mode: PublishMode) -> String {
    let publish = match mode {
        PublishMode::PullRequest => " Use PR workflow.",
        PublishMode::PushToMain => " Push directly to main.",
    };
    format!("Generate release documents for v{version} from existing feature documents.{publish}")
}

/// Display name of the project from its lowercase root (`opensearch` → `OpenSearch`).
pub fn project_name(root_name: &str) -> String {
    match root_name {
        "opensearch" => "OpenSearch".to_string(),
        other => {
            let mut chars = other.chars();
            chars
                .next()
                .map(|c| c.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn investigate_issue_defaults_to_pull_request() {
        let prompt = investigate(&InvestigateTarget::Issue(42), &InvestigateOptions::default());
        assert_eq!(
            prompt,
            "Investigate GitHub Issue #42. Use PR workflow (create branch, pull request, and auto-merge)."
        );
    }

    #[test]
    fn investigate_feature_with_all_options() {
        let opts = InvestigateOptions {
            publish: PublishMode::PushToMain,
            overwrite: true,
            lang: Some("ja".into()),
        };
        let target = InvestigateTarget::Feature {
            name: "Star Tree".into(),
            pr: Some(16233),
        };
        assert_eq!(
            investigate(&target, &opts),
            "Investigate feature \"Star Tree\" starting from PR #16233. Push directly to main. \
             Overwrite existing reports. Output in language code 'ja'."
        );
    }

    #[test]
    fn create_issues_appends_filters() {
        assert_eq!(
            create_issues(123, None, None),
            "Create investigation Issues from tracking Issue #123."
        );
        assert_eq!(
            create_issues(123, Some(20), Some("features")),
            "Create investigation Issues from tracking Issue #123. Create only 20 Issues. \
             Only create Issues for category: features."
        );
    }

    #[test]
    fn explore_defaults_to_english() {
        assert_eq!(
            explore("Segment Replication", None),
            "Explore the \"Segment Replication\" feature in language code \"en\""
        );
        assert!(explore("Segment Replication", Some("ja")).ends_with("\"ja\""));
    }

    #[test]
    fn file_prompts_name_the_files() {
        let batch = Path::new(".cache/releases/v3.0.0/batch.json");
        let groups = Path::new(".cache/releases/v3.0.0/groups.json");
        let prompt = group_batch(batch, groups);
        assert!(prompt.contains(".cache/releases/v3.0.0/batch.json"));
        assert!(prompt.contains(".cache/releases/v3.0.0/groups.json"));

        assert!(planner("OpenSearch", "3.0.0", groups, None).starts_with("Create GitHub Project and Issues for OpenSearch v3.0.0"));
        assert!(review_groups(groups).contains("groups.json"));
    }

    #[test]
    fn summarize_with_language() {
        assert_eq!(
            summarize("OpenSearch", "3.0.0", Some("ja")),
            "Create release summary for OpenSearch v3.0.0. Output in language code 'ja'."
        );
        assert_eq!(
            summarize("OpenSearch", "3.0.0", None),
            "Create release summary for OpenSearch v3.0.0."
        );
    }

    #[test]
    fn planner_with_language() {
        let groups = Path::new(".cache/releases/v3.0.0/groups.json");
        assert_eq!(
            planner("OpenSearch", "3.0.0", groups, Some("ja")),
            "Create GitHub Project and Issues for OpenSearch v3.0.0 from .cache/releases/v3.0.0/groups.json. \
             Create max 20 Issues per run. Resume from where left off. Output in language code 'ja'."
        );
        assert!(planner("OpenSearch", "3.0.0", groups, None).ends_with("Resume from where left off."));
    }

    #[test]
    fn translate_feature_report() {
        let target = TranslateTarget::Feature("Segment Replication".into());
        assert_eq!(
            translate(&target, "ja"),
            "Translate \"docs/features/Segment Replication.md\" to \"ja\". \
             Save as \"docs/features/Segment Replication.ja.md\""
        );
        assert_eq!(
            translate(&target, "en"),
            "Translate \"docs/features/Segment Replication.md\" to \"en\". \
             Save as \"docs/features/Segment Replication.md\""
        );
    }

    #[test]
    fn translate_release_reports() {
        assert_eq!(
            translate(&TranslateTarget::Release("3.0.0".into()), "ja"),
            "Translate reports in \"docs/releases/v3.0.0/\" to \"ja\"."
        );
    }

    #[test]
    fn release_docs_publish_modes() {
        assert_eq!(
            generate_release_docs("3.0.0", PublishMode::PullRequest),
            "Generate release documents for v3.0.0 from existing feature documents. Use PR workflow."
        );
        assert_eq!(
            generate_release_docs("3.0.0", PublishMode::PushToMain),
            "Generate release documents for v3.0.0 from existing feature documents. Push directly to main."
        );
    }

    #[test]
    fn project_names() {
        assert_eq!(project_name("opensearch"), "OpenSearch");
        assert_eq!(project_name("widgets"), "Widgets");
        assert_eq!(project_name(""), "");
    }
}
