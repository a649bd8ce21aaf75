use anyhow::{anyhow, Context, Result};
use dirs::config_dir;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

pub const KEY_TOKEN: &str = "GITHUB_TOKEN";
pub const KEY_USERNAME: &str = "GITHUB_USERNAME";
pub const KEY_BLACKLIST: &str = "BLACKLIST";
pub const KEY_FOLLOW_BACK: &str = "FOLLOW_BACK";
pub const KEY_UNFOLLOW: &str = "UNFOLLOW_NON_FOLLOWERS";
pub const KEY_RESERVE: &str = "RESERVE";
pub const KEY_MAX_RETRIES: &str = "MAX_RETRIES";
pub const KEY_RETRY_DELAY: &str = "RETRY_DELAY_SECS";
pub const KEY_API_URL: &str = "API_URL";

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Main configuration structure for followsync
///
/// Stored as one `KEY=value` pair per line. Unknown keys survive a
/// load/save round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Personal access token; calls are unauthenticated without one
    pub token: Option<String>,

    /// Account whose followers/following are reconciled
    pub username: Option<String>,

    /// Accounts never followed or unfollowed
    pub blacklist: BTreeSet<String>,

    /// Follow accounts that follow us but we don't follow
    pub follow_back: bool,

    /// Unfollow accounts we follow that don't follow us
    pub unfollow_non_followers: bool,

    /// Quota the planner refuses to spend
    pub reserve: u64,

    /// Attempts per API call, first try included
    pub max_retries: usize,

    /// Fixed delay between attempts in seconds
    pub retry_delay_secs: u64,

    /// REST API base URL
    pub api_url: String,

    extra: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            username: None,
            blacklist: BTreeSet::new(),
            follow_back: true,
            unfollow_non_followers: true,
            reserve: crate::plan::DEFAULT_RESERVE,
            max_retries: crate::retry::DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: crate::retry::DEFAULT_RETRY_DELAY.as_secs(),
            api_url: DEFAULT_API_URL.to_string(),
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let entries = dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::default();
        for entry in entries {
            let (key, value) =
                entry.with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config
                .set(&key, &value)
                .with_context(|| format!("Invalid value in config file: {:?}", path))?;
        }

        Ok(config)
    }

    /// Save configuration to a file, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
        }

        std::fs::write(path, self.to_lines())
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("followsync").join("config.txt"))
    }

    /// Expand `~` and environment variables in a user supplied path
    pub fn expand_path(path: &str) -> Result<PathBuf> {
        let expanded = shellexpand::full(path)
            .with_context(|| format!("Failed to expand path: {}", path))?;
        Ok(PathBuf::from(expanded.into_owned()))
    }

    /// Fill a missing token from the `GITHUB_TOKEN` environment variable
    pub fn with_env_token(mut self) -> Self {
        if self.token.is_none() {
            if let Ok(token) = std::env::var(KEY_TOKEN) {
                if !token.trim().is_empty() {
                    tracing::debug!("Using GITHUB_TOKEN from environment");
                    self.token = Some(token.trim().to_string());
                }
            }
        }
        self
    }

    /// Apply a single `KEY=value` pair
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key.trim() {
            KEY_TOKEN => self.token = non_empty(value),
            KEY_USERNAME => self.username = non_empty(value),
            KEY_BLACKLIST => self.blacklist = parse_blacklist(value),
            KEY_FOLLOW_BACK => self.follow_back = parse_bool(KEY_FOLLOW_BACK, value)?,
            KEY_UNFOLLOW => self.unfollow_non_followers = parse_bool(KEY_UNFOLLOW, value)?,
            KEY_RESERVE => {
                self.reserve = value
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer", KEY_RESERVE))?
            }
            KEY_MAX_RETRIES => {
                self.max_retries = value
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer", KEY_MAX_RETRIES))?
            }
            KEY_RETRY_DELAY => {
                self.retry_delay_secs = value
                    .parse()
                    .with_context(|| format!("{} must be a number of seconds", KEY_RETRY_DELAY))?
            }
            KEY_API_URL => {
                if value.is_empty() {
                    return Err(anyhow!("{} must not be empty", KEY_API_URL));
                }
                self.api_url = value.trim_end_matches('/').to_string();
            }
            other => {
                tracing::debug!("Keeping unknown config key: {}", other);
                self.extra.insert(other.to_string(), value.to_string());
            }
        }
        Ok(())
    }

    /// Serialize to the `KEY=value` line format
    ///
    /// Every value is double quoted so any string reloads unchanged.
    pub fn to_lines(&self) -> String {
        let mut entries = vec![
            (KEY_TOKEN, self.token.clone().unwrap_or_default()),
            (KEY_USERNAME, self.username.clone().unwrap_or_default()),
            (KEY_BLACKLIST, self.blacklist_string()),
            (KEY_FOLLOW_BACK, self.follow_back.to_string()),
            (KEY_UNFOLLOW, self.unfollow_non_followers.to_string()),
            (KEY_RESERVE, self.reserve.to_string()),
            (KEY_MAX_RETRIES, self.max_retries.to_string()),
            (KEY_RETRY_DELAY, self.retry_delay_secs.to_string()),
        ];

        if self.api_url != DEFAULT_API_URL {
            entries.push((KEY_API_URL, self.api_url.clone()));
        }

        let mut content = String::new();
        for (key, value) in entries
            .iter()
            .map(|(key, value)| (*key, value.as_str()))
            .chain(self.extra.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        {
            content.push_str(&format!("{}={}\n", key, quote(value)));
        }
        content
    }

    /// Blacklist joined with commas, as stored on disk
    pub fn blacklist_string(&self) -> String {
        self.blacklist.iter().cloned().collect::<Vec<_>>().join(",")
    }

    /// Username required for a run
    pub fn require_username(&self) -> Result<&str> {
        self.username
            .as_deref()
            .ok_or_else(|| anyhow!("{} is not set. Run: followsync init --username <name>", KEY_USERNAME))
    }

    /// Retry policy shared by the gateway and the executor
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }
}

/// Split a comma separated blacklist, ignoring blanks
pub fn parse_blacklist(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(anyhow!("{} must be true or false, got '{}'", key, other)),
    }
}

/// Check that `name` could be a GitHub login
///
/// Logins are 1-39 ASCII letters, digits or hyphens and never start with a
/// hyphen.
pub fn validate_login(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 39
        && !name.starts_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(anyhow!("'{}' is not a valid GitHub username", name))
    }
}

// Double quotes with `"`, `\` and `$` escaped; dotenvy reads it back verbatim.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' | '$' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
