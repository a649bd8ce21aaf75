//! System health checks for followsync
//!
//! This module provides preflight checks to verify the configuration and
//! credentials before a run.

use std::path::Path;

use crate::error::ApiError;
use crate::github::{GitHubClient, RateLimitStatus, UserProbe};
use crate::Config;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Config file status
    pub config_file: CheckResult,
    /// Username configured
    pub username: CheckResult,
    /// GitHub token validity
    pub github_auth: CheckResult,
    /// Quota headroom (warning only)
    pub quota: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    #[cfg(test)]
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub async fn run(config: &Config, config_path: &Path) -> Self {
        let client = GitHubClient::new(config);

        let (github_auth, quota) = match &client {
            Ok(client) => (
                Self::check_github_auth(config, client.validate_token().await),
                Self::check_quota(config, client.check_quota().await),
            ),
            Err(e) => (
                CheckResult::error_with_details("Could not create GitHub client", e.to_string()),
                CheckResult::warning_with_details("Quota unknown", e.to_string()),
            ),
        };

        Self {
            config_file: Self::check_config_file(config_path),
            username: Self::check_username(config),
            github_auth,
            quota,
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.config_file.passed && self.username.passed && self.github_auth.passed
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.all_checks()
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.is_warning)
            .collect()
    }

    fn check_config_file(path: &Path) -> CheckResult {
        if path.exists() {
            CheckResult::ok_with_details("Config file found", path.display().to_string())
        } else {
            CheckResult::error_with_details(
                "Config file not found",
                format!(
                    "Expected at {}\nRun: followsync init --username <name>",
                    path.display()
                ),
            )
        }
    }

    fn check_username(config: &Config) -> CheckResult {
        match &config.username {
            Some(username) => CheckResult::ok_with_details("Username configured", username.clone()),
            None => CheckResult::error_with_details(
                "GITHUB_USERNAME is not set",
                "Run: followsync init --username <name>",
            ),
        }
    }

    /// Check GitHub authentication
    fn check_github_auth(config: &Config, result: Result<UserProbe, ApiError>) -> CheckResult {
        match result {
            Ok(probe) => match &config.username {
                Some(username) if !username.eq_ignore_ascii_case(&probe.login) => {
                    CheckResult::warning_with_details(
                        "GitHub authentication successful for a different account",
                        format!(
                            "Token belongs to {}, config names {}. Follow/unfollow acts on {}",
                            probe.login, username, probe.login
                        ),
                    )
                }
                _ => CheckResult::ok_with_details(
                    "GitHub authentication successful",
                    format!("Username: {}", probe.login),
                ),
            },
            Err(e) => CheckResult::error_with_details(
                "GitHub authentication failed",
                format!("{}\nSet GITHUB_TOKEN in the config file or environment", e),
            ),
        }
    }

    /// Check quota headroom above the reserve (warning only)
    fn check_quota(config: &Config, result: Result<RateLimitStatus, ApiError>) -> CheckResult {
        match result {
            Ok(quota) if quota.remaining > config.reserve => CheckResult::ok_with_details(
                "API quota available",
                format!("{} requests remaining", quota.remaining),
            ),
            Ok(quota) => CheckResult::warning_with_details(
                "API quota below reserve",
                format!(
                    "{} requests remaining, reserve is {}. Resets at {}",
                    quota.remaining, config.reserve, quota.reset_at
                ),
            ),
            Err(e) => CheckResult::warning_with_details("Could not read API quota", e.to_string()),
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Config File", &self.config_file),
            ("Username", &self.username),
            ("GitHub Authentication", &self.github_auth),
            ("API Quota", &self.quota),
        ]
    }
}
