//! Reconciliation planning: who to follow, who to unfollow, and how many
//! actions the remaining quota allows.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use crate::fetch::UserSet;
use crate::github::RateLimitStatus;

/// Quota the planner never spends
pub const DEFAULT_RESERVE: u64 = 100;

/// API calls budgeted per action: the mutation plus bookkeeping
pub const CALLS_PER_ACTION: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub reserve: u64,
    pub follow_enabled: bool,
    pub unfollow_enabled: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            reserve: DEFAULT_RESERVE,
            follow_enabled: true,
            unfollow_enabled: true,
        }
    }
}

/// `floor((remaining - reserve) / 3)`, zero when remaining is below reserve
pub fn max_allowed_actions(remaining: u64, reserve: u64) -> u64 {
    remaining.saturating_sub(reserve) / CALLS_PER_ACTION
}

/// Derived per run, never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionPlan {
    /// `followers - following - blacklist`
    pub to_follow: UserSet,
    /// `following - followers - blacklist`
    pub to_unfollow: UserSet,
    /// The slice of `to_follow` that fits in the budget
    pub follow_batch: Vec<String>,
    /// The slice of `to_unfollow` that fits in what follow left over
    pub unfollow_batch: Vec<String>,
    pub max_actions: u64,
    pub quota: RateLimitStatus,
    pub options: PlanOptions,
}

impl ActionPlan {
    /// No action can be afforded
    pub fn insufficient_quota(&self) -> bool {
        self.max_actions == 0
    }

    /// Both categories disabled by configuration
    pub fn actions_disabled(&self) -> bool {
        !self.options.follow_enabled && !self.options.unfollow_enabled
    }

    /// Total actions the executor will attempt
    pub fn batch_len(&self) -> usize {
        self.follow_batch.len() + self.unfollow_batch.len()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            to_follow: self.to_follow.len(),
            to_unfollow: self.to_unfollow.len(),
            follow_batch: self.follow_batch.len(),
            unfollow_batch: self.unfollow_batch.len(),
            follow_enabled: self.options.follow_enabled,
            unfollow_enabled: self.options.unfollow_enabled,
            max_actions: self.max_actions,
            remaining: self.quota.remaining,
            reset_at: self.quota.reset_at,
        }
    }
}

/// Counts shown to the operator before confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub to_follow: usize,
    pub to_unfollow: usize,
    pub follow_batch: usize,
    pub unfollow_batch: usize,
    pub follow_enabled: bool,
    pub unfollow_enabled: bool,
    pub max_actions: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Compute the action plan for one run
///
/// Follow is serviced first; unfollow gets whatever budget follow did not
/// use. Disabled categories still report their candidate sets but get an
/// empty batch.
pub fn plan(
    followers: &UserSet,
    following: &UserSet,
    blacklist: &BTreeSet<String>,
    quota: RateLimitStatus,
    options: PlanOptions,
) -> ActionPlan {
    let to_follow: UserSet = followers
        .difference(following)
        .filter(|login| !blacklist.contains(*login))
        .cloned()
        .collect();
    let to_unfollow: UserSet = following
        .difference(followers)
        .filter(|login| !blacklist.contains(*login))
        .cloned()
        .collect();

    let max_actions = max_allowed_actions(quota.remaining, options.reserve);
    let budget = usize::try_from(max_actions).unwrap_or(usize::MAX);

    let follow_take = if options.follow_enabled {
        to_follow.len().min(budget)
    } else {
        0
    };
    let unfollow_take = if options.unfollow_enabled {
        to_unfollow.len().min(budget - follow_take)
    } else {
        0
    };

    let follow_batch = to_follow.iter().take(follow_take).cloned().collect();
    let unfollow_batch = to_unfollow.iter().take(unfollow_take).cloned().collect();

    tracing::debug!(
        "Plan: {} to follow ({} batched), {} to unfollow ({} batched), budget {}",
        to_follow.len(),
        follow_take,
        to_unfollow.len(),
        unfollow_take,
        max_actions
    );

    ActionPlan {
        to_follow,
        to_unfollow,
        follow_batch,
        unfollow_batch,
        max_actions,
        quota,
        options,
    }
}
