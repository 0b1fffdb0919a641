use clap::Parser;
use repo_updater::config::{resolve_repository, Command, UpdateArgs};
use repo_updater::domain::ports::BranchLister;
use repo_updater::utils::error::{ErrorSeverity, UpdateError};
use repo_updater::utils::{logger, validation::Validate};
use repo_updater::{CliConfig, GitHubClient, UpdateEngine, UpdaterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting repo-updater");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    let result = match load_config(&cli) {
        Ok(config) => match &cli.command {
            Command::Branches { owner, repository } => {
                list_branches(&cli, config, owner.as_deref(), repository.as_deref()).await
            }
            Command::Update(args) => run_update(&cli, config, args).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        tracing::error!(
            "❌ Operation failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn load_config(cli: &CliConfig) -> Result<UpdaterConfig, UpdateError> {
    tracing::debug!("Loading configuration from: {}", cli.config.display());
    let config = UpdaterConfig::from_file(&cli.config)?;
    config.validate()?;
    Ok(config)
}

async fn list_branches(
    cli: &CliConfig,
    mut config: UpdaterConfig,
    owner: Option<&str>,
    repository: Option<&str>,
) -> Result<(), UpdateError> {
    let repo = resolve_repository(owner, repository, &config)?;
    let client = GitHubClient::new(config.github.clone())?;

    let branches = client.list_branches(&repo).await?;

    config.owner = repo.owner.clone();
    config.repository = repo.repository.clone();
    config.save(&cli.config)?;

    if branches.is_empty() {
        return Err(UpdateError::retrieval(
            "No branches found. Check owner and repository.",
        ));
    }

    for branch in &branches {
        let when = branch
            .last_commit_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let sha = branch
            .commit_sha
            .as_deref()
            .map(|s| s.get(..7).unwrap_or(s))
            .unwrap_or("-");
        println!(
            "{:<30} {:<16} {:<7} {}",
            branch.name,
            when,
            sha,
            branch.commit_summary.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

async fn run_update(
    cli: &CliConfig,
    mut config: UpdaterConfig,
    args: &UpdateArgs,
) -> Result<(), UpdateError> {
    let request = args.to_request(&config)?;
    let client = GitHubClient::new(config.github.clone())?;
    let engine = UpdateEngine::new_with_monitoring(client, cli.monitor);

    println!("Starting workflow: downloading branch and updating files.");
    let outcome = engine.run(&request).await?;

    config.owner = request.repository.owner.clone();
    config.repository = request.repository.repository.clone();
    config.excludes = request.excludes.clone();
    config.save(&cli.config)?;

    for line in outcome.report_lines() {
        tracing::info!("✅ {}", line);
        println!("✅ {}", line);
    }

    Ok(())
}
