pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::github::GitHubClient;
pub use config::{GitHubSettings, UpdaterConfig};
pub use core::exclusion::{ExclusionRule, ExclusionSet};
pub use core::updater::UpdateEngine;
pub use domain::model::{BranchInfo, MergeResult, RepositoryRef, UpdateOutcome, UpdateRequest};
pub use utils::error::{Result, UpdateError};
