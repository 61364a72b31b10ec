//! Shared types, error model, and configuration for relnotes.
//!
//! This crate is the foundation depended on by all other relnotes crates.
//! It provides:
//! - [`RelnotesError`]: the unified error type
//! - Domain types ([`ChangeItem`], [`FeatureGroup`], [`PipelineCheckpoint`], [`WorkItem`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, GithubConfig, OracleConfig, SourceConfig, WorklistConfig,
    config_dir, config_file_path, github_token, init_config, load_config, load_config_from,
    validate_config,
};
pub use error::{RelnotesError, Result};
pub use types::{
    BatchFile, Category, CategorySummary, ChangeItem, FeatureGroup, ItemRef, PipelineCheckpoint,
    RawItemCache, WorkItem,
};
