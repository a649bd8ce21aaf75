use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use followsync::config::validate_login;
use followsync::confirm::render_summary;
use followsync::health::CheckResult;
use followsync::{
    Config, ConfirmationPort, DryRun, FixedAnswer, GitHubClient, HealthCheck, RateLimitStatus,
    RunOutcome, SyncEngine, SyncReport, TerminalPrompt,
};

#[derive(Parser)]
#[command(name = "followsync")]
#[command(about = "Follow back your GitHub followers and unfollow the rest, within your API quota")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a fresh configuration file
    Init {
        /// Account to reconcile
        #[arg(short, long)]
        username: String,

        /// Personal access token (falls back to $GITHUB_TOKEN at run time)
        #[arg(short, long)]
        token: Option<String>,
    },

    /// Fetch, plan, confirm and execute
    Run {
        /// Plan only, make no changes
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Do not follow anyone this run
        #[arg(long)]
        no_follow: bool,

        /// Do not unfollow anyone this run
        #[arg(long)]
        no_unfollow: bool,
    },

    /// Show what a run would do
    Plan,

    /// Show the current API quota
    Limits,

    /// Manage authentication
    Auth {
        #[command(subcommand)]
        auth_command: AuthCommands,
    },

    /// Manage the blacklist
    Blacklist {
        #[command(subcommand)]
        blacklist_command: BlacklistCommands,
    },

    /// System health check and diagnostics
    Doctor,
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Show authentication status
    Status,
}

#[derive(Subcommand)]
enum BlacklistCommands {
    /// Print blacklisted users
    List,

    /// Add users to the blacklist
    Add {
        #[arg(required = true)]
        users: Vec<String>,
    },

    /// Remove users from the blacklist
    Remove {
        #[arg(required = true)]
        users: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting followsync v{}", env!("CARGO_PKG_VERSION"));

    let config_path = resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Init { username, token } => cmd_init(&config_path, username, token),
        Commands::Run {
            dry_run,
            yes,
            no_follow,
            no_unfollow,
        } => {
            let mut config = load_config(&config_path)?;
            config.follow_back &= !no_follow;
            config.unfollow_non_followers &= !no_unfollow;
            cmd_run(config, dry_run, yes).await
        }
        Commands::Plan => cmd_run(load_config(&config_path)?, true, false).await,
        Commands::Limits => cmd_limits(&load_config(&config_path)?).await,
        Commands::Auth { auth_command } => cmd_auth(auth_command, &load_config(&config_path)?).await,
        Commands::Blacklist { blacklist_command } => cmd_blacklist(blacklist_command, &config_path),
        Commands::Doctor => cmd_doctor(&load_config(&config_path)?, &config_path).await,
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}

fn resolve_config_path(config_path: Option<&str>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Config::expand_path(path),
        None => Config::default_config_path(),
    }
}

/// Load configuration from the resolved path, or defaults if it is absent
fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load(path)?
    } else {
        info!("No configuration at {:?}, using defaults", path);
        Config::default()
    };
    Ok(config.with_env_token())
}

/// Write a fresh configuration file
fn cmd_init(config_path: &Path, username: String, token: Option<String>) -> Result<()> {
    info!("Initializing followsync...");
    validate_login(username.trim())?;

    let mut config = Config::default();
    config.username = Some(username.trim().to_string());
    config.token = token.filter(|t| !t.trim().is_empty());

    config.save(config_path)?;
    info!("Configuration saved to: {:?}", config_path);

    println!("✅ followsync initialized successfully!");
    println!("   Config: {}", config_path.display());
    println!("   Username: {}", username.trim());
    if config.token.is_none() {
        println!("   💡 No token stored. Set GITHUB_TOKEN in the config file or environment");
    }
    println!("   Next: run 'followsync doctor', then 'followsync plan'");

    Ok(())
}

/// Fetch, plan and (unless dry run) confirm and execute
async fn cmd_run(config: Config, dry_run: bool, assume_yes: bool) -> Result<()> {
    config.require_username()?;

    let mut engine = SyncEngine::new(config)?;

    println!("🔍 Retrieving followers and following...");
    let plan = engine.run_dry_run().await?;
    print_dry_run(&plan);

    if dry_run {
        println!("\n🔍 Dry run mode - no changes made");
        return Ok(());
    }

    let port: Box<dyn ConfirmationPort> = if assume_yes {
        Box::new(FixedAnswer(true))
    } else {
        Box::new(TerminalPrompt)
    };

    let report = engine.run_execute(&plan, port.as_ref()).await?;
    print_report(&report);

    Ok(())
}

fn print_dry_run(dry_run: &DryRun) {
    println!("   👥 Followers: {}", dry_run.followers.len());
    println!("   👥 Following: {}", dry_run.following.len());
    println!();
    println!("{}", render_summary(&dry_run.summary()));

    let plan = &dry_run.plan;
    for username in &plan.follow_batch {
        println!("   ➕ {}", username);
    }
    for username in &plan.unfollow_batch {
        println!("   ➖ {}", username);
    }
    if plan.insufficient_quota() {
        println!(
            "\n⚠️  Not enough API requests available. Resets at {}",
            plan.quota.reset_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
}

fn print_report(report: &SyncReport) {
    match report.outcome {
        RunOutcome::Completed => println!("\n🎉 Run complete!"),
        other => println!("\n⏹️  Run ended: {}", other),
    }

    let execution = &report.execution;
    println!("   ✅ Followed: {}", execution.followed.len());
    println!("   ✅ Unfollowed: {}", execution.unfollowed.len());
    println!("   ❌ Failed: {}", execution.failures.len());
    println!("   📡 API requests made: {}", report.requests_made);
    println!("   ⏱️  Duration: {:.2}s", report.duration.as_secs_f64());

    if execution.halted_early {
        println!("   ⚠️  Stopped early: action budget used up");
    }

    match &report.quota {
        Some(quota) => print_quota("   ", quota),
        None => println!("   ⚠️  Remaining quota unknown"),
    }

    if !execution.failures.is_empty() {
        println!("\n🔍 Failed Operations:");
        for failure in &execution.failures {
            println!("   ❌ {}", failure);
        }
    }
}

fn print_quota(indent: &str, quota: &RateLimitStatus) {
    let minutes = quota.resets_in(Utc::now()).num_minutes().max(0);
    match quota.limit {
        Some(limit) => println!("{}🔄 API requests left: {}/{}", indent, quota.remaining, limit),
        None => println!("{}🔄 API requests left: {}", indent, quota.remaining),
    }
    println!(
        "{}⏰ Resets at: {} (in {} min)",
        indent,
        quota.reset_at.format("%Y-%m-%d %H:%M:%S UTC"),
        minutes
    );
}

/// Show quota from `/rate_limit` and from the `/user` headers
async fn cmd_limits(config: &Config) -> Result<()> {
    let client = GitHubClient::new(config).context("Failed to create GitHub client")?;

    println!("📊 GitHub API quota");
    let quota = client.check_quota().await?;
    print_quota("   ", &quota);

    if client.has_token() {
        match client.current_user().await {
            Ok(probe) => match probe.rate {
                Some(rate) => {
                    println!("\n📊 Per response headers (as {})", probe.login);
                    print_quota("   ", &rate);
                }
                None => println!("\n⚠️  No rate limit headers on /user response"),
            },
            Err(e) => println!("\n❌ Header probe failed: {}", e),
        }
    }

    Ok(())
}

/// Handle authentication commands
async fn cmd_auth(auth_command: AuthCommands, config: &Config) -> Result<()> {
    match auth_command {
        AuthCommands::Status => {
            let client = GitHubClient::new(config).context("Failed to create GitHub client")?;
            match client.validate_token().await {
                Ok(probe) => {
                    println!("✅ Authentication successful");
                    println!("   Username: {}", probe.login);
                    if let Some(configured) = &config.username {
                        if !configured.eq_ignore_ascii_case(&probe.login) {
                            println!(
                                "   ⚠️  Configured username is {}; follow/unfollow acts on {}",
                                configured, probe.login
                            );
                        }
                    }
                }
                Err(e) => {
                    println!("❌ Authentication failed: {}", e);
                    return Err(e).context("GitHub authentication failed");
                }
            }
            Ok(())
        }
    }
}

/// Edit the blacklist and save it back to the config file
fn cmd_blacklist(blacklist_command: BlacklistCommands, config_path: &Path) -> Result<()> {
    let mut config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    match blacklist_command {
        BlacklistCommands::List => {
            if config.blacklist.is_empty() {
                println!("Blacklist is empty");
            } else {
                println!("Blacklist ({}):", config.blacklist.len());
                for username in &config.blacklist {
                    println!("  🚫 {}", username);
                }
            }
            return Ok(());
        }
        BlacklistCommands::Add { users } => {
            let users: Vec<&str> = users.iter().map(|u| u.trim()).filter(|u| !u.is_empty()).collect();
            for username in &users {
                validate_login(username)?;
            }
            for username in users {
                if config.blacklist.insert(username.to_string()) {
                    println!("  ➕ {}", username);
                } else {
                    println!("  ⏭️  {} already blacklisted", username);
                }
            }
        }
        BlacklistCommands::Remove { users } => {
            for username in users.iter().map(|u| u.trim()) {
                if config.blacklist.remove(username) {
                    println!("  ➖ {}", username);
                } else {
                    println!("  ⏭️  {} not in blacklist", username);
                }
            }
        }
    }

    config.save(config_path)?;
    info!("Blacklist saved to {:?}", config_path);
    Ok(())
}

/// System health check and diagnostics
async fn cmd_doctor(config: &Config, config_path: &Path) -> Result<()> {
    let health = HealthCheck::run(config, config_path).await;
    print_health_report(&health);
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 followsync System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
