use crate::config::toml_config::{UpdaterConfig, DEFAULT_CONFIG_FILE};
use crate::core::exclusion::ExclusionSet;
use crate::domain::model::{RepositoryRef, UpdateRequest};
use crate::utils::error::{Result, UpdateError};
use crate::utils::validation::validate_non_empty_string;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "repo-updater")]
#[command(about = "Update a directory tree from a GitHub branch archive")]
pub struct CliConfig {
    /// Path to the persisted TOML configuration
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,

    #[arg(long, help = "Log timing and memory usage per phase")]
    pub monitor: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the branches of a repository, most recently updated first
    Branches {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        repository: Option<String>,
    },
    /// Download a branch and merge it over the target directory
    Update(UpdateArgs),
}

#[derive(Debug, Clone, Args)]
pub struct UpdateArgs {
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub repository: Option<String>,

    #[arg(long)]
    pub branch: String,

    #[arg(long, default_value = ".")]
    pub target_directory: PathBuf,

    /// Path to protect from being overwritten (repeatable)
    #[arg(long = "exclude")]
    pub excludes: Vec<String>,

    /// File with one excluded path per line
    #[arg(long)]
    pub excludes_file: Option<PathBuf>,

    /// Write a backup archive into the target directory first
    #[arg(long)]
    pub backup: bool,

    /// Parent directory for the temporary staging directory
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,
}

/// 命令列有值時優先，否則使用設定檔中的值
pub fn resolve_repository(
    owner: Option<&str>,
    repository: Option<&str>,
    config: &UpdaterConfig,
) -> Result<RepositoryRef> {
    let owner = owner.unwrap_or(&config.owner);
    let repository = repository.unwrap_or(&config.repository);

    if validate_non_empty_string("owner", owner).is_err()
        || validate_non_empty_string("repository", repository).is_err()
    {
        return Err(UpdateError::validation(
            "Please provide both an owner and a repository",
        ));
    }

    Ok(RepositoryRef::new(owner, repository))
}

impl UpdateArgs {
    /// 排除規則來源：--exclude、--excludes-file，兩者皆無時使用設定檔
    pub fn exclusion_set(&self, config: &UpdaterConfig) -> Result<ExclusionSet> {
        if self.excludes.is_empty() && self.excludes_file.is_none() {
            return Ok(config.excludes.clone());
        }

        let mut raw = self.excludes.join("\n");
        if let Some(path) = &self.excludes_file {
            let content = std::fs::read_to_string(path)
                .map_err(|e| UpdateError::io_at("could not read excludes file", path, e))?;
            raw.push('\n');
            raw.push_str(&content);
        }
        Ok(ExclusionSet::parse(&raw))
    }

    pub fn to_request(&self, config: &UpdaterConfig) -> Result<UpdateRequest> {
        let repository =
            resolve_repository(self.owner.as_deref(), self.repository.as_deref(), config)?;

        Ok(UpdateRequest {
            repository,
            branch: self.branch.trim().to_string(),
            target_directory: self.target_directory.clone(),
            excludes: self.exclusion_set(config)?,
            create_backup: self.backup,
            staging_parent: self.staging_dir.clone(),
        })
    }
}
