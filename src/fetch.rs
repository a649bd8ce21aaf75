//! Paginated follower/following retrieval.
//!
//! Pages are requested with `per_page=100&page=N` until GitHub returns an
//! empty page. A `Link` header without `rel="next"` also ends the walk early.
//! Blacklisted logins are dropped as pages arrive, so downstream code never
//! sees them.

use reqwest::Method;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::github::{has_next_link, GitHubClient};

/// GitHub's maximum page size for these endpoints
pub const PAGE_SIZE: u32 = 100;

/// A set of GitHub logins
pub type UserSet = BTreeSet<String>;

/// Which side of the social graph to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Followers,
    Following,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Following => "following",
        }
    }

    /// Path of page `page` for `username`
    pub fn page_path(&self, username: &str, page: u32) -> String {
        format!(
            "/users/{}/{}?per_page={}&page={}",
            username,
            self.as_str(),
            PAGE_SIZE,
            page
        )
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    login: String,
}

/// Everything gathered for one relation
#[derive(Debug)]
pub struct FetchOutcome {
    pub relation: Relation,
    pub users: UserSet,
    /// Non-empty pages received
    pub pages: u32,
    /// Blacklisted logins seen and dropped
    pub excluded: usize,
    /// The error that stopped pagination early, if any
    pub error: Option<ApiError>,
}

impl FetchOutcome {
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Fetch the full follower or following set of `username`
///
/// Never fails outright: an error on any page stops pagination and is
/// returned alongside whatever was collected before it.
pub async fn fetch_users(
    client: &GitHubClient,
    username: &str,
    relation: Relation,
    blacklist: &BTreeSet<String>,
) -> FetchOutcome {
    let mut outcome = FetchOutcome {
        relation,
        users: UserSet::new(),
        pages: 0,
        excluded: 0,
        error: None,
    };
    let mut page = 1u32;

    info!("Retrieving {} for {}", relation, username);

    loop {
        let path = relation.page_path(username, page);

        let response = match client.request(Method::GET, &path, None).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Stopping {} pagination at page {} with {} users: {}",
                    relation,
                    page,
                    outcome.users.len(),
                    e
                );
                outcome.error = Some(e);
                break;
            }
        };

        let entries: Vec<UserEntry> = match serde_json::from_value(response.body) {
            Ok(entries) => entries,
            Err(e) => {
                let err = ApiError::Decode {
                    path,
                    message: e.to_string(),
                };
                warn!("Stopping {} pagination: {}", relation, err);
                outcome.error = Some(err);
                break;
            }
        };

        if entries.is_empty() {
            debug!("Page {} of {} is empty, done", page, relation);
            break;
        }

        outcome.pages += 1;
        let received = entries.len();
        for entry in entries {
            if blacklist.contains(&entry.login) {
                outcome.excluded += 1;
                continue;
            }
            outcome.users.insert(entry.login);
        }
        debug!("Page {} of {}: {} users", page, relation, received);

        if let Some(link) = &response.link {
            if !has_next_link(link) {
                debug!("No next link after page {} of {}, done", page, relation);
                break;
            }
        }

        page += 1;
    }

    info!(
        "Retrieved {} {} ({} blacklisted skipped)",
        outcome.users.len(),
        relation,
        outcome.excluded
    );

    outcome
}
