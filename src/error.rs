//! Error types shared by the gateway, fetcher and sync engine.
//!
//! Per-user follow/unfollow failures are not errors: they are recorded as
//! [`ActionFailure`](crate::executor::ActionFailure) entries in the run report.

use thiserror::Error;

use crate::fetch::Relation;

/// Errors returned by [`GitHubClient`](crate::github::GitHubClient) calls.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failures or timeouts that outlived the retry policy.
    #[error("network error after {attempts} attempt(s): {message}")]
    Transient { attempts: usize, message: String },

    /// Missing or rejected credentials (HTTP 401).
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Any other non-2xx response.
    #[error("GitHub API returned {code}: {body}")]
    Status { code: u16, body: String },

    /// A 2xx response whose body did not have the expected shape.
    #[error("unexpected response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl ApiError {
    /// Whether the retry policy should try the call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Transient { .. } => true,
            ApiError::Status { code, .. } => *code >= 500,
            ApiError::Auth(_) | ApiError::Decode { .. } => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            ApiError::Auth(_) => Some(401),
            _ => None,
        }
    }
}

/// Errors that abort a run before any mutation happens.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Pagination stopped early; the partial set is reported but never acted on.
    #[error("failed to fetch {relation} after {fetched} user(s): {source}")]
    Fetch {
        relation: Relation,
        fetched: usize,
        #[source]
        source: ApiError,
    },

    #[error("failed to read rate limit: {0}")]
    Quota(#[source] ApiError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let transient = ApiError::Transient {
            attempts: 3,
            message: "connection reset".to_string(),
        };
        assert!(transient.is_retryable());

        let server = ApiError::Status {
            code: 502,
            body: "bad gateway".to_string(),
        };
        assert!(server.is_retryable());

        let client = ApiError::Status {
            code: 422,
            body: "unprocessable".to_string(),
        };
        assert!(!client.is_retryable());
        assert!(!ApiError::Auth("Bad credentials".to_string()).is_retryable());
    }

    #[test]
    fn test_fetch_error_message_names_relation() {
        let err = SyncError::Fetch {
            relation: Relation::Following,
            fetched: 200,
            source: ApiError::Status {
                code: 404,
                body: "Not Found".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("following"));
        assert!(message.contains("200"));
    }
}
