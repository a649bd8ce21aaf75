//! Follow/unfollow mutations with per-user retry.
//!
//! A mutation succeeds only on HTTP 204. Each user gets its own retry budget,
//! and a user that keeps failing is recorded and skipped so the batch carries
//! on.

use reqwest::Method;
use std::fmt;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::github::GitHubClient;
use crate::plan::ActionPlan;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Follow,
    Unfollow,
}

impl ActionKind {
    fn method(&self) -> Method {
        match self {
            ActionKind::Follow => Method::PUT,
            ActionKind::Unfollow => Method::DELETE,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            ActionKind::Follow => "follow",
            ActionKind::Unfollow => "unfollow",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// A user the executor gave up on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub kind: ActionKind,
    pub username: String,
    pub attempts: usize,
    pub reason: String,
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "could not {} {} after {} attempt(s): {}",
            self.kind, self.username, self.attempts, self.reason
        )
    }
}

/// What a batch actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub followed: Vec<String>,
    pub unfollowed: Vec<String>,
    pub failures: Vec<ActionFailure>,
    /// Stopped because the action budget was used up
    pub halted_early: bool,
}

impl ExecutionOutcome {
    pub fn completed(&self) -> usize {
        self.followed.len() + self.unfollowed.len()
    }
}

/// Runs follow/unfollow calls through the gateway
pub struct Executor<'a> {
    client: &'a GitHubClient,
    retry: RetryPolicy,
}

impl<'a> Executor<'a> {
    /// Executor using the client's retry policy for per-user attempts
    pub fn new(client: &'a GitHubClient) -> Self {
        Self::with_retry(client, client.retry_policy())
    }

    pub fn with_retry(client: &'a GitHubClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// `PUT /user/following/{username}`
    pub async fn follow(&self, username: &str) -> bool {
        self.act(ActionKind::Follow, username).await.is_ok()
    }

    /// `DELETE /user/following/{username}`
    pub async fn unfollow(&self, username: &str) -> bool {
        self.act(ActionKind::Unfollow, username).await.is_ok()
    }

    /// Run the plan's batches, follow first
    ///
    /// Stops as soon as the completed count reaches the plan's budget.
    pub async fn execute(&self, plan: &ActionPlan) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome::default();
        let budget = usize::try_from(plan.max_actions).unwrap_or(usize::MAX);

        let batches = [
            (ActionKind::Follow, &plan.follow_batch),
            (ActionKind::Unfollow, &plan.unfollow_batch),
        ];

        'batches: for (kind, batch) in batches {
            if batch.is_empty() {
                continue;
            }
            info!("Starting {} process ({} users)", kind, batch.len());

            for username in batch.iter() {
                if outcome.completed() >= budget {
                    warn!("API limit reached, stopping {} process", kind);
                    outcome.halted_early = true;
                    break 'batches;
                }

                match self.act(kind, username).await {
                    Ok(()) => match kind {
                        ActionKind::Follow => outcome.followed.push(username.clone()),
                        ActionKind::Unfollow => outcome.unfollowed.push(username.clone()),
                    },
                    Err(failure) => {
                        warn!("Failed to {} {}, moving to the next", kind, username);
                        outcome.failures.push(failure);
                    }
                }
            }
        }

        info!(
            "Completed {} actions ({} failed)",
            outcome.completed(),
            outcome.failures.len()
        );
        outcome
    }

    async fn act(&self, kind: ActionKind, username: &str) -> Result<(), ActionFailure> {
        let path = format!("/user/following/{}", username);
        let label = format!("{} {}", kind, username);

        let result = self
            .retry
            .run(
                &label,
                || async {
                    let response = self.client.request_once(kind.method(), &path, None).await?;
                    if response.status == 204 {
                        Ok::<(), ApiError>(())
                    } else {
                        Err(ApiError::Status {
                            code: response.status,
                            body: format!("expected 204, got {}", response.status),
                        })
                    }
                },
                // Retrying a rejected token only burns quota.
                |err: &ApiError| !matches!(err, ApiError::Auth(_)),
            )
            .await;

        match result {
            Ok(()) => {
                info!("✅ {}ed {}", capitalize(kind.verb()), username);
                Ok(())
            }
            Err(err) => {
                let attempts = match err {
                    ApiError::Auth(_) => 1,
                    _ => self.retry.attempts(),
                };
                let failure = ActionFailure {
                    kind,
                    username: username.to_string(),
                    attempts,
                    reason: err.to_string(),
                };
                error!("❌ {}", failure);
                Err(failure)
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
