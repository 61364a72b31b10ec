//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use relnotes_core::fetch::{FetchReleaseConfig, fetch_release};
use relnotes_core::grouping::{GroupingConfig, GroupingMode, GroupingReport, run_grouping};
use relnotes_core::jobs::{InvestigationConfig, JobRunOutcome, run_batch_investigation};
use relnotes_core::oracle::{OracleRequest, ProcessOracle, Workflow, invoke_checked};
use relnotes_core::planning::run_planning;
use relnotes_core::prompts::{
    self, InvestigateOptions, InvestigateTarget, PublishMode, TranslateTarget,
};
use relnotes_core::release::{ReleaseConfig, investigate_release};
use relnotes_core::worklist::GhIssueList;
use relnotes_shared::{AppConfig, Category, init_config, load_config, load_config_from};
use relnotes_storage::CheckpointStore;
use tracing::info;

use crate::progress::CliProgress;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// relnotes: group release notes into features and investigate them.
#[derive(Parser)]
#[command(
    name = "relnotes",
    version,
    about = "Group release-note items into features and drive per-feature investigations.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.relnotes/relnotes.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Category filter for `create-issues`.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum IssueCategory {
    Features,
    Enhancements,
    Breaking,
    Bugfixes,
}

impl IssueCategory {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Enhancements => "enhancements",
            Self::Breaking => "breaking",
            Self::Bugfixes => "bugfixes",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Fetch release notes and save the extracted items to raw-items.json.
    Fetch {
        /// Release version (e.g. 3.0.0).
        version: String,
    },

    /// Group raw items into feature groups, one batch at a time.
    Group {
        version: String,

        /// Items per batch (defaults to the configured batch size).
        #[arg(long)]
        batch_size: Option<usize>,

        /// Process all remaining batches.
        #[arg(long)]
        all: bool,
    },

    /// Review and split feature groups.
    ReviewGroups { version: String },

    /// Create tracking issues for every feature group.
    Plan {
        version: String,

        /// Output language code (e.g. ja).
        #[arg(long)]
        lang: Option<String>,
    },

    /// Create investigation issues from a tracking issue.
    CreateIssues {
        /// Tracking issue number.
        #[arg(long)]
        tracking: u64,

        /// Maximum number of issues to create.
        #[arg(long)]
        limit: Option<usize>,

        #[arg(long)]
        category: Option<IssueCategory>,
    },

    /// Investigate a single feature or issue.
    Investigate {
        /// Feature name.
        feature: Option<String>,

        /// Issue number to investigate.
        #[arg(long)]
        issue: Option<u64>,

        /// Starting PR number.
        #[arg(long)]
        pr: Option<u64>,

        /// Output language code (e.g. ja).
        #[arg(long)]
        lang: Option<String>,

        /// Push directly to main instead of opening a pull request.
        #[arg(long)]
        no_pr: bool,

        /// Overwrite existing reports.
        #[arg(long)]
        overwrite: bool,
    },

    /// Investigate open issues one after another.
    BatchInvestigate {
        /// Only issues labelled for this release.
        version: Option<String>,

        /// Number of issues (defaults to the configured count).
        count: Option<usize>,

        /// Process every open issue.
        #[arg(long)]
        all: bool,

        #[arg(long)]
        lang: Option<String>,

        #[arg(long)]
        no_pr: bool,
    },

    /// Investigate a single feature in an interactive session.
    FeatureInvestigate {
        feature: String,

        /// Starting PR number.
        #[arg(long)]
        pr: Option<u64>,

        #[arg(long)]
        lang: Option<String>,

        #[arg(long)]
        no_pr: bool,
    },

    /// Explore a feature interactively.
    Explore {
        feature: String,

        /// Response language code (defaults to en).
        #[arg(long)]
        lang: Option<String>,
    },

    /// Create a release summary from feature reports.
    Summarize {
        version: String,

        #[arg(long)]
        lang: Option<String>,
    },

    /// Translate existing reports.
    #[command(group(clap::ArgGroup::new("target").required(true).args(["feature", "release"])))]
    Translate {
        /// Feature report to translate.
        #[arg(long)]
        feature: Option<String>,

        /// Release whose reports to translate.
        #[arg(long)]
        release: Option<String>,

        /// Target language code (e.g. ja).
        #[arg(long)]
        to: String,
    },

    /// Generate release documents from existing feature documents.
    GenerateReleaseDocs {
        version: String,

        #[arg(long)]
        no_pr: bool,
    },

    /// Full release investigation: fetch, group, plan, investigate, summarize.
    Release {
        version: String,

        #[arg(long)]
        lang: Option<String>,

        #[arg(long)]
        no_pr: bool,

        /// Only investigate issues labelled for this release.
        #[arg(long)]
        release_only: bool,
    },

    /// Interactive session for working on the tool itself.
    Dev,

    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "relnotes=info",
        1 => "relnotes=debug",
        _ => "relnotes=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Everything a pipeline command needs, resolved from the config file.
struct Context {
    config: AppConfig,
    store: CheckpointStore,
    oracle: ProcessOracle,
}

impl Context {
    fn load(path: Option<&PathBuf>) -> Result<Self> {
        let config = load_app_config(path)?;
        let store = CheckpointStore::open(&config.defaults.cache_dir)?;
        let oracle = ProcessOracle::new(config.oracle.clone());
        Ok(Self {
            config,
            store,
            oracle,
        })
    }

    fn project(&self) -> String {
        prompts::project_name(&self.config.github.root_name)
    }
}

fn load_app_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    Ok(match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    })
}

fn publish_mode(no_pr: bool) -> PublishMode {
    if no_pr {
        PublishMode::PushToMain
    } else {
        PublishMode::PullRequest
    }
}

fn investigate_options(lang: Option<String>, no_pr: bool, overwrite: bool) -> InvestigateOptions {
    InvestigateOptions {
        publish: publish_mode(no_pr),
        overwrite,
        lang,
    }
}

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_ref();

    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        };
    }

    let ctx = Context::load(config_path)?;
    match cli.command {
        Command::Fetch { version } => cmd_fetch(&ctx, &version).await,
        Command::Group {
            version,
            batch_size,
            all,
        } => cmd_group(&ctx, &version, batch_size, all).await,
        Command::ReviewGroups { version } => {
            let prompt = prompts::review_groups(&ctx.store.checkpoint_path(&version));
            run_workflow(&ctx, OracleRequest::interactive(Workflow::ReviewGroups, prompt)).await
        }
        Command::Plan { version, lang } => cmd_plan(&ctx, &version, lang.as_deref()).await,
        Command::CreateIssues {
            tracking,
            limit,
            category,
        } => {
            let prompt = prompts::create_issues(tracking, limit, category.as_ref().map(IssueCategory::as_str));
            run_workflow(&ctx, OracleRequest::batch(Workflow::CreateIssues, prompt)).await
        }
        Command::Investigate {
            feature,
            issue,
            pr,
            lang,
            no_pr,
            overwrite,
        } => {
            let target = match (issue, feature) {
                (Some(number), _) => InvestigateTarget::Issue(number),
                (None, Some(name)) => InvestigateTarget::Feature { name, pr },
                (None, None) => InvestigateTarget::OldestOpen,
            };
            let opts = investigate_options(lang, no_pr, overwrite);
            let prompt = prompts::investigate(&target, &opts);
            run_workflow(&ctx, OracleRequest::batch(Workflow::Investigate, prompt)).await
        }
        Command::BatchInvestigate {
            version,
            count,
            all,
            lang,
            no_pr,
        } => {
            let limit = if all {
                None
            } else {
                Some(count.unwrap_or(ctx.config.defaults.investigate_count))
            };
            cmd_batch_investigate(&ctx, version, limit, investigate_options(lang, no_pr, false)).await
        }
        Command::FeatureInvestigate {
            feature,
            pr,
            lang,
            no_pr,
        } => {
            let target = InvestigateTarget::Feature { name: feature, pr };
            let prompt = prompts::investigate(&target, &investigate_options(lang, no_pr, false));
            run_workflow(&ctx, OracleRequest::interactive(Workflow::Investigate, prompt)).await
        }
        Command::Explore { feature, lang } => {
            let prompt = prompts::explore(&feature, lang.as_deref());
            run_workflow(&ctx, OracleRequest::interactive(Workflow::Explore, prompt)).await
        }
        Command::Summarize { version, lang } => {
            let prompt = prompts::summarize(&ctx.project(), &version, lang.as_deref());
            run_workflow(&ctx, OracleRequest::batch(Workflow::Summarize, prompt)).await
        }
        Command::Translate { feature, release, to } => {
            let target = match (feature, release) {
                (Some(name), _) => TranslateTarget::Feature(name),
                (None, Some(version)) => TranslateTarget::Release(version),
                (None, None) => return Err(eyre!("translate needs --feature or --release")),
            };
            let prompt = prompts::translate(&target, &to);
            run_workflow(&ctx, OracleRequest::interactive(Workflow::Translate, prompt)).await
        }
        Command::GenerateReleaseDocs { version, no_pr } => {
            let prompt = prompts::generate_release_docs(&version, publish_mode(no_pr));
            run_workflow(&ctx, OracleRequest::batch(Workflow::GenerateReleaseDocs, prompt)).await
        }
        Command::Release {
            version,
            lang,
            no_pr,
            release_only,
        } => {
            let options = investigate_options(lang, no_pr, false);
            cmd_release(&ctx, &version, release_only, options).await
        }
        Command::Dev => run_workflow(&ctx, OracleRequest::interactive(Workflow::Dev, "")).await,
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_fetch(ctx: &Context, version: &str) -> Result<()> {
    info!(version, "fetching release notes");
    let reporter = CliProgress::new();
    let fetch = FetchReleaseConfig::from_app(&ctx.config, version);
    let result = fetch_release(&fetch, &ctx.store, &reporter).await;
    reporter.clear();
    let cache = result?;

    println!();
    println!("  Items:         {}", cache.summary.total);
    for category in Category::ALL {
        println!("  {:<14} {}", format!("{category}:"), cache.summary.count(category));
    }
    println!(
        "  Saved to:      {}",
        ctx.store.item_cache_path(version).display()
    );
    println!();
    Ok(())
}

async fn cmd_group(ctx: &Context, version: &str, batch_size: Option<usize>, all: bool) -> Result<()> {
    let config = GroupingConfig {
        version: version.to_string(),
        batch_size: batch_size.unwrap_or(ctx.config.defaults.batch_size),
        mode: if all {
            GroupingMode::Drain
        } else {
            GroupingMode::SingleStep
        },
    };
    info!(version, batch_size = config.batch_size, all, "grouping items");

    let reporter = CliProgress::new();
    let report = run_grouping(&ctx.store, &ctx.oracle, &config, &reporter).await?;
    reporter.clear();

    match report {
        GroupingReport::Complete { total, groups } => {
            println!("\nAll {total} items processed. {groups} groups created.");
        }
        GroupingReport::Paused { remaining, .. } => {
            println!("\n{remaining} items remaining. Run with --all to process all.");
        }
    }
    Ok(())
}

async fn cmd_plan(ctx: &Context, version: &str, lang: Option<&str>) -> Result<()> {
    let reporter = CliProgress::new();
    let report =
        run_planning(&ctx.store, &ctx.oracle, &ctx.project(), version, lang, &reporter).await?;
    reporter.clear();
    println!(
        "\nAll {} groups have a tracking issue ({} planner rounds).",
        report.groups, report.rounds
    );
    Ok(())
}

async fn cmd_batch_investigate(
    ctx: &Context,
    version: Option<String>,
    limit: Option<usize>,
    options: InvestigateOptions,
) -> Result<()> {
    let config = InvestigationConfig {
        labels: ctx.config.worklist.labels.clone(),
        version,
        limit,
        options,
    };
    let worklist = GhIssueList::new(&ctx.config.worklist);
    let reporter = CliProgress::new();
    let outcome = run_batch_investigation(&ctx.oracle, &worklist, &config, &reporter).await;
    reporter.clear();
    report_jobs(&outcome)
}

/// Work-list selection for step 4 of a release run: every open issue, or
/// only those labelled for `version` when `release_only` is set.
fn release_investigation(
    labels: Vec<String>,
    version: &str,
    release_only: bool,
    options: InvestigateOptions,
) -> InvestigationConfig {
    InvestigationConfig {
        labels,
        version: release_only.then(|| version.to_string()),
        limit: None,
        options,
    }
}

async fn cmd_release(
    ctx: &Context,
    version: &str,
    release_only: bool,
    options: InvestigateOptions,
) -> Result<()> {
    println!("=== Release Investigation: v{version} ===\n");

    let config = ReleaseConfig {
        fetch: FetchReleaseConfig::from_app(&ctx.config, version),
        batch_size: ctx.config.defaults.batch_size,
        investigation: release_investigation(
            ctx.config.worklist.labels.clone(),
            version,
            release_only,
            options,
        ),
    };
    let worklist = GhIssueList::new(&ctx.config.worklist);
    let reporter = CliProgress::new();
    let result = investigate_release(&config, &ctx.store, &ctx.oracle, &worklist, &reporter).await;
    reporter.clear();
    let report = result?;

    println!(
        "\n  Items: {}  Groups: {}  Planner rounds: {}",
        report.items, report.groups, report.planning_rounds
    );
    report_jobs(&report.investigation)?;
    println!("\n=== Release Investigation Complete: v{version} ===");
    Ok(())
}

/// Print the batch summary; any failed job makes the command fail.
fn report_jobs(outcome: &JobRunOutcome) -> Result<()> {
    match outcome {
        JobRunOutcome::NoItems { .. } => println!("{outcome}"),
        JobRunOutcome::Completed(_) => {
            println!("\n==================================================");
            println!("Batch Summary");
            println!("==================================================");
            print!("{outcome}");
        }
    }
    match outcome.failure_count() {
        0 => Ok(()),
        failed => Err(eyre!("{failed} investigation(s) failed")),
    }
}

async fn run_workflow(ctx: &Context, request: OracleRequest) -> Result<()> {
    info!(workflow = %request.workflow, "running workflow");
    invoke_checked(&ctx.oracle, &request).await?;
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&PathBuf>) -> Result<()> {
    let config = load_app_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_group_flags() {
        let cli = Cli::parse_from(["relnotes", "group", "3.0.0", "--batch-size", "20", "--all"]);
        match cli.command {
            Command::Group {
                version,
                batch_size,
                all,
            } => {
                assert_eq!(version, "3.0.0");
                assert_eq!(batch_size, Some(20));
                assert!(all);
            }
            _ => panic!("expected group"),
        }
    }

    #[test]
    fn parses_batch_investigate_positionals() {
        let cli = Cli::parse_from(["relnotes", "batch-investigate", "3.0.0", "10", "--no-pr", "-vv"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::BatchInvestigate {
                version,
                count,
                all,
                no_pr,
                ..
            } => {
                assert_eq!(version.as_deref(), Some("3.0.0"));
                assert_eq!(count, Some(10));
                assert!(!all);
                assert!(no_pr);
            }
            _ => panic!("expected batch-investigate"),
        }
    }

    #[test]
    fn parses_create_issues_category() {
        let cli = Cli::parse_from([
            "relnotes",
            "create-issues",
            "--tracking",
            "123",
            "--category",
            "bugfixes",
        ]);
        match cli.command {
            Command::CreateIssues {
                tracking, category, ..
            } => {
                assert_eq!(tracking, 123);
                assert_eq!(category.map(|c| c.as_str()), Some("bugfixes"));
            }
            _ => panic!("expected create-issues"),
        }
    }

    #[test]
    fn translate_needs_exactly_one_target() {
        let cli = Cli::parse_from(["relnotes", "translate", "--feature", "Star Tree", "--to", "ja"]);
        match cli.command {
            Command::Translate { feature, release, to } => {
                assert_eq!(feature.as_deref(), Some("Star Tree"));
                assert!(release.is_none());
                assert_eq!(to, "ja");
            }
            _ => panic!("expected translate"),
        }

        assert!(Cli::try_parse_from(["relnotes", "translate", "--to", "ja"]).is_err());
        assert!(
            Cli::try_parse_from([
                "relnotes", "translate", "--feature", "A", "--release", "3.0.0", "--to", "ja",
            ])
            .is_err()
        );
        assert!(Cli::try_parse_from(["relnotes", "translate", "--release", "3.0.0"]).is_err());
    }

    #[test]
    fn parses_remaining_workflows() {
        let cli = Cli::parse_from(["relnotes", "generate-release-docs", "3.0.0", "--no-pr"]);
        assert!(matches!(
            cli.command,
            Command::GenerateReleaseDocs { ref version, no_pr: true } if version == "3.0.0"
        ));

        let cli = Cli::parse_from(["relnotes", "feature-investigate", "Star Tree", "--pr", "16233"]);
        assert!(matches!(
            cli.command,
            Command::FeatureInvestigate { pr: Some(16233), no_pr: false, .. }
        ));

        let cli = Cli::parse_from(["relnotes", "plan", "3.0.0", "--lang", "ja"]);
        assert!(matches!(cli.command, Command::Plan { lang: Some(ref l), .. } if l == "ja"));

        assert!(matches!(Cli::parse_from(["relnotes", "dev"]).command, Command::Dev));
    }

    #[test]
    fn release_covers_every_open_issue_unless_restricted() {
        let labels = vec!["status/todo".to_string()];
        let all = release_investigation(labels.clone(), "3.0.0", false, InvestigateOptions::default());
        assert_eq!(all.query_labels(), vec!["status/todo".to_string()]);

        let only = release_investigation(labels, "3.0.0", true, InvestigateOptions::default());
        assert_eq!(
            only.query_labels(),
            vec!["status/todo".to_string(), "release/v3.0.0".to_string()]
        );

        let cli = Cli::parse_from(["relnotes", "release", "3.0.0", "--release-only"]);
        assert!(matches!(cli.command, Command::Release { release_only: true, .. }));
    }

    #[test]
    fn global_config_flag() {
        let cli = Cli::parse_from(["relnotes", "--config", "/tmp/r.toml", "config", "show"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/r.toml")));
    }

    #[test]
    fn failed_jobs_fail_the_command() {
        use relnotes_core::jobs::{JobResult, JobStatus, JobSummary};
        use relnotes_shared::WorkItem;

        let outcome = JobRunOutcome::Completed(JobSummary {
            results: vec![JobResult {
                item: WorkItem {
                    id: 1,
                    title: "Star Tree".into(),
                },
                status: JobStatus::Failed,
            }],
        });
        assert!(report_jobs(&outcome).is_err());
        assert!(report_jobs(&JobRunOutcome::NoItems { labels: vec![] }).is_ok());
    }
}
