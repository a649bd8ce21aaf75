//! Sync Engine - Orchestrates one follower reconciliation run
//!
//! A run moves through `Fetching → Planning → AwaitingConfirmation →
//! Executing → Reporting` and back to `Idle`. Fetch and planning errors jump
//! straight to `Reporting` and no mutation is made.

use anyhow::Context;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{validate_login, Config};
use crate::confirm::ConfirmationPort;
use crate::error::SyncError;
use crate::executor::{ExecutionOutcome, Executor};
use crate::fetch::{fetch_users, FetchOutcome, Relation, UserSet};
use crate::github::{GitHubClient, RateLimitStatus};
use crate::plan::{plan, ActionPlan, PlanOptions, PlanSummary};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Fetching,
    Planning,
    AwaitingConfirmation,
    Executing,
    Reporting,
}

/// Both snapshots and the plan derived from them
#[derive(Debug, Clone)]
pub struct DryRun {
    pub followers: UserSet,
    pub following: UserSet,
    pub plan: ActionPlan,
}

impl DryRun {
    pub fn summary(&self) -> PlanSummary {
        self.plan.summary()
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The plan was executed (possibly with per-user failures)
    Completed,
    /// The operator said no
    Declined,
    /// Quota is at or below the reserve
    InsufficientQuota,
    /// Nothing to follow or unfollow
    NothingToDo,
    /// Follow and unfollow are both turned off
    ActionsDisabled,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Declined => "cancelled by operator",
            RunOutcome::InsufficientQuota => "not enough API requests available",
            RunOutcome::NothingToDo => "nothing to do",
            RunOutcome::ActionsDisabled => "follow and unfollow are disabled",
        };
        f.write_str(text)
    }
}

/// Results from a complete run
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub outcome: RunOutcome,
    pub followers: usize,
    pub following: usize,
    pub summary: PlanSummary,
    pub execution: ExecutionOutcome,
    /// Counted API requests made during the run
    pub requests_made: u64,
    /// Quota after the run; `None` if the final probe failed
    pub quota: Option<RateLimitStatus>,
    pub duration: Duration,
}

/// The main sync engine that reconciles followers and following
pub struct SyncEngine {
    config: Config,
    client: GitHubClient,
    phase: RunPhase,
    started: Option<Instant>,
}

impl SyncEngine {
    /// Create a new sync engine with the given configuration
    pub fn new(config: Config) -> Result<Self, SyncError> {
        let client = GitHubClient::new(&config).map_err(|e| SyncError::Config(e.to_string()))?;

        Ok(Self {
            config,
            client,
            phase: RunPhase::Idle,
            started: None,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn blacklist(&self) -> &BTreeSet<String> {
        &self.config.blacklist
    }

    /// Replace the blacklist; takes effect on the next run
    ///
    /// Blank entries are skipped. Any entry that is not a GitHub login
    /// rejects the whole update.
    pub fn set_blacklist<I, S>(&mut self, names: I) -> Result<(), SyncError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut blacklist = BTreeSet::new();
        for name in names {
            let name: String = name.into();
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            validate_login(name).map_err(|e| SyncError::Config(e.to_string()))?;
            blacklist.insert(name.to_string());
        }
        self.config.blacklist = blacklist;
        Ok(())
    }

    pub fn save_config(&self, path: &Path) -> anyhow::Result<()> {
        self.config.save(path)
    }

    /// Reload configuration from disk and rebuild the API client
    pub fn load_config(&mut self, path: &Path) -> anyhow::Result<()> {
        let config = Config::load(path)?.with_env_token();
        let client = GitHubClient::new(&config).context("Failed to create GitHub client")?;
        self.config = config;
        self.client = client;
        Ok(())
    }

    fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            reserve: self.config.reserve,
            follow_enabled: self.config.follow_back,
            unfollow_enabled: self.config.unfollow_non_followers,
        }
    }

    fn transition(&mut self, next: RunPhase) {
        debug!("Run phase: {:?} -> {:?}", self.phase, next);
        self.phase = next;
    }

    fn fail(&mut self, err: SyncError) -> SyncError {
        self.transition(RunPhase::Reporting);
        error!("🚨 {}", err);
        self.transition(RunPhase::Idle);
        err
    }

    /// Fetch both lists, read the quota and plan. Makes no mutation.
    pub async fn run_dry_run(&mut self) -> Result<DryRun, SyncError> {
        self.client.reset_request_count();
        self.started = Some(Instant::now());

        let username = match self.config.username.clone() {
            Some(username) => username,
            None => {
                return Err(self.fail(SyncError::Config(
                    "GITHUB_USERNAME is not set".to_string(),
                )))
            }
        };

        self.transition(RunPhase::Fetching);
        info!("Retrieving followers and following for {}", username);

        let followers = self.fetch(&username, Relation::Followers).await?;
        let following = self.fetch(&username, Relation::Following).await?;

        self.transition(RunPhase::Planning);
        let quota = match self.client.check_quota().await {
            Ok(quota) => quota,
            Err(e) => return Err(self.fail(SyncError::Quota(e))),
        };

        let plan = plan(
            &followers,
            &following,
            &self.config.blacklist,
            quota,
            self.plan_options(),
        );

        info!(
            "Followers: {}, following: {}, to follow: {}, to unfollow: {}, max actions: {}",
            followers.len(),
            following.len(),
            plan.to_follow.len(),
            plan.to_unfollow.len(),
            plan.max_actions
        );

        Ok(DryRun {
            followers,
            following,
            plan,
        })
    }

    async fn fetch(&mut self, username: &str, relation: Relation) -> Result<UserSet, SyncError> {
        let FetchOutcome { users, error, .. } =
            fetch_users(&self.client, username, relation, &self.config.blacklist).await;

        match error {
            None => Ok(users),
            Some(source) => Err(self.fail(SyncError::Fetch {
                relation,
                fetched: users.len(),
                source,
            })),
        }
    }

    /// Confirm and execute a dry run's plan, then report
    pub async fn run_execute(
        &mut self,
        dry_run: &DryRun,
        port: &dyn ConfirmationPort,
    ) -> Result<SyncReport, SyncError> {
        let plan = &dry_run.plan;
        let summary = plan.summary();

        let outcome = if plan.actions_disabled() {
            info!("Follow and unfollow are disabled, no actions to perform");
            RunOutcome::ActionsDisabled
        } else if plan.insufficient_quota() {
            warn!(
                "Not enough API requests available ({} left, reserve {}). Try again after {}",
                plan.quota.remaining, plan.options.reserve, plan.quota.reset_at
            );
            RunOutcome::InsufficientQuota
        } else if plan.batch_len() == 0 {
            info!("Nothing to follow or unfollow");
            RunOutcome::NothingToDo
        } else {
            self.transition(RunPhase::AwaitingConfirmation);
            if port.confirm(&summary) {
                RunOutcome::Completed
            } else {
                info!("Operation cancelled by operator");
                RunOutcome::Declined
            }
        };

        let execution = if outcome == RunOutcome::Completed {
            self.transition(RunPhase::Executing);
            Executor::new(&self.client).execute(plan).await
        } else {
            ExecutionOutcome::default()
        };

        self.transition(RunPhase::Reporting);
        let quota = match self.client.check_quota().await {
            Ok(quota) => Some(quota),
            Err(e) => {
                warn!("Could not read remaining quota: {}", e);
                None
            }
        };

        let report = SyncReport {
            outcome,
            followers: dry_run.followers.len(),
            following: dry_run.following.len(),
            summary,
            execution,
            requests_made: self.client.request_count(),
            quota,
            duration: self.started.take().map(|s| s.elapsed()).unwrap_or_default(),
        };

        info!(
            "Run {}: {} followed, {} unfollowed, {} failed, {} requests made",
            report.outcome,
            report.execution.followed.len(),
            report.execution.unfollowed.len(),
            report.execution.failures.len(),
            report.requests_made
        );

        self.transition(RunPhase::Idle);
        Ok(report)
    }

    /// Dry run followed by execution
    pub async fn run(&mut self, port: &dyn ConfirmationPort) -> Result<SyncReport, SyncError> {
        let dry_run = self.run_dry_run().await?;
        self.run_execute(&dry_run, port).await
    }
}
