use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ApiError;
use crate::retry::RetryPolicy;

const USER_AGENT: &str = concat!("followsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Quota snapshot read from `/rate_limit` or from `X-RateLimit-*` headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: Option<u64>,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitStatus {
    /// Parse the rate limit headers GitHub attaches to most responses
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let read = |name: &str| -> Option<i64> {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse().ok())
        };

        let remaining = read("x-ratelimit-remaining")?;
        let reset = read("x-ratelimit-reset")?;

        Some(Self {
            limit: read("x-ratelimit-limit").and_then(|limit| u64::try_from(limit).ok()),
            remaining: u64::try_from(remaining).unwrap_or(0),
            reset_at: epoch_to_utc(reset),
        })
    }

    /// Time left until the window resets, zero if already past
    pub fn resets_in(&self, now: DateTime<Utc>) -> chrono::Duration {
        (self.reset_at - now).max(chrono::Duration::zero())
    }
}

fn epoch_to_utc(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

/// A successful response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body, `Null` when empty (204)
    pub body: Value,
    pub rate: Option<RateLimitStatus>,
    /// Raw `Link` header, if the endpoint paginates
    pub link: Option<String>,
}

/// Result of `GET /user`
#[derive(Debug, Clone)]
pub struct UserProbe {
    pub login: String,
    pub rate: Option<RateLimitStatus>,
}

#[derive(Deserialize)]
struct RateLimitBody {
    resources: RateLimitResources,
}

#[derive(Deserialize)]
struct RateLimitResources {
    core: CoreRateLimit,
}

#[derive(Deserialize)]
struct CoreRateLimit {
    #[serde(default)]
    limit: Option<u64>,
    remaining: u64,
    reset: i64,
}

#[derive(Deserialize)]
struct AuthenticatedUser {
    login: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accounting {
    Counted,
    Uncounted,
}

/// Authenticated gateway to the GitHub REST API
///
/// Owns the token, the retry policy and the per-run request counter. All
/// calls go through [`GitHubClient::request`] or [`GitHubClient::request_once`].
pub struct GitHubClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    retry: RetryPolicy,
    requests: AtomicU64,
}

impl GitHubClient {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        if config.token.is_none() {
            warn!("No GitHub token configured; requests are unauthenticated and mutations will fail");
        }
        Self::with_settings(&config.api_url, config.token.clone(), config.retry_policy())
    }

    /// Create a client against an explicit base URL
    pub fn with_settings(
        base_url: &str,
        token: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self, ApiError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Transient {
                attempts: 0,
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
            retry,
            requests: AtomicU64::new(0),
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Counted requests since the last reset
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Called at the start of each run
    pub fn reset_request_count(&self) {
        self.requests.store(0, Ordering::SeqCst);
    }

    /// Issue a request, retrying transport failures and 5xx responses
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.request_with(method, path, body, Accounting::Counted)
            .await
    }

    /// Issue a request exactly once
    pub async fn request_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<ApiResponse, ApiError> {
        self.send(method, path, body, Accounting::Counted).await
    }

    /// Read the core quota from `/rate_limit`
    ///
    /// GitHub does not charge this endpoint against the quota, so it is kept
    /// out of the request counter as well.
    pub async fn check_quota(&self) -> Result<RateLimitStatus, ApiError> {
        let response = self
            .request_with(Method::GET, "/rate_limit", None, Accounting::Uncounted)
            .await?;

        let parsed: RateLimitBody =
            serde_json::from_value(response.body).map_err(|e| ApiError::Decode {
                path: "/rate_limit".to_string(),
                message: e.to_string(),
            })?;

        let core = parsed.resources.core;
        let status = RateLimitStatus {
            limit: core.limit,
            remaining: core.remaining,
            reset_at: epoch_to_utc(core.reset),
        };
        debug!(
            "Rate limit: {} remaining, resets at {}",
            status.remaining, status.reset_at
        );
        Ok(status)
    }

    /// `GET /user`: validates the token and returns the header quota probe
    pub async fn current_user(&self) -> Result<UserProbe, ApiError> {
        let response = self.request(Method::GET, "/user", None).await?;

        let user: AuthenticatedUser =
            serde_json::from_value(response.body).map_err(|e| ApiError::Decode {
                path: "/user".to_string(),
                message: e.to_string(),
            })?;

        Ok(UserProbe {
            login: user.login,
            rate: response.rate,
        })
    }

    /// Validate the configured token with a single `GET /user`
    pub async fn validate_token(&self) -> Result<UserProbe, ApiError> {
        if !self.has_token() {
            return Err(ApiError::Auth("no GitHub token configured".to_string()));
        }

        let probe = self.current_user().await?;
        info!("Authenticated as GitHub user: {}", probe.login);
        Ok(probe)
    }

    async fn request_with(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        accounting: Accounting,
    ) -> Result<ApiResponse, ApiError> {
        let label = format!("{} {}", method, path);
        let attempts = self.retry.attempts();

        self.retry
            .run(
                &label,
                || self.send(method.clone(), path, body, accounting),
                ApiError::is_retryable,
            )
            .await
            .map_err(|err| match err {
                ApiError::Transient { message, .. } => ApiError::Transient { attempts, message },
                other => other,
            })
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        accounting: Accounting,
    ) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method, &url);
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("token {}", token));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        if accounting == Accounting::Counted {
            self.requests.fetch_add(1, Ordering::SeqCst);
        }

        let response = request.send().await.map_err(|e| ApiError::Transient {
            attempts: 1,
            message: e.to_string(),
        })?;

        let status = response.status();
        let rate = RateLimitStatus::from_headers(response.headers());
        let link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let text = response.text().await.map_err(|e| ApiError::Transient {
            attempts: 1,
            message: e.to_string(),
        })?;

        if status.is_success() {
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&text).map_err(|e| ApiError::Decode {
                    path: path.to_string(),
                    message: e.to_string(),
                })?
            };

            return Ok(ApiResponse {
                status: status.as_u16(),
                body,
                rate,
                link,
            });
        }

        if status.as_u16() == 401 {
            return Err(ApiError::Auth(error_message(&text)));
        }

        Err(ApiError::Status {
            code: status.as_u16(),
            body: text,
        })
    }
}

/// Prefer GitHub's `message` field over the raw body
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// Whether a `Link` header advertises another page
pub fn has_next_link(link: &str) -> bool {
    link.split(',')
        .any(|part| part.contains("rel=\"next\""))
}
