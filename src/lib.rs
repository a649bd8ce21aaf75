//! followsync - Rate-limit aware GitHub follower reconciliation
//!
//! followsync follows back the accounts that follow you and unfollows the
//! accounts that don't, without spending your API quota below a reserve and
//! never touching blacklisted accounts.
//!
//! ## Core Features
//!
//! - **Paginated retrieval**: Full follower/following sets, 100 per page
//! - **Quota-aware planning**: Actions capped to what the rate limit allows
//! - **Per-user retries**: One failing account never stops the batch
//! - **Blacklist**: Accounts excluded from every decision
//!
//! ## Modules
//!
//! - [`config`]: `KEY=value` configuration file
//! - [`github`]: REST gateway with retries and rate limit introspection
//! - [`fetch`]: Paginated follower/following retrieval
//! - [`plan`]: Follow/unfollow planning within quota
//! - [`executor`]: Follow/unfollow mutations
//! - [`sync`]: Run orchestration and reporting

pub mod config;
pub mod confirm;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod github;
pub mod health;
pub mod plan;
pub mod retry;
pub mod sync;

pub use config::Config;
pub use confirm::{ConfirmationPort, FixedAnswer, TerminalPrompt};
pub use error::{ApiError, SyncError};
pub use executor::{ActionFailure, ExecutionOutcome, Executor};
pub use fetch::{fetch_users, FetchOutcome, Relation, UserSet};
pub use github::{GitHubClient, RateLimitStatus};
pub use health::HealthCheck;
pub use plan::{plan, ActionPlan, PlanOptions, PlanSummary};
pub use retry::RetryPolicy;
pub use sync::{DryRun, RunOutcome, RunPhase, SyncEngine, SyncReport};
