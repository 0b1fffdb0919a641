#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{resolve_repository, CliConfig, Command, UpdateArgs};
pub use toml_config::{GitHubSettings, UpdaterConfig};
