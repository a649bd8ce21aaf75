//! Common test utilities and helpers for followsync tests
#![allow(dead_code)]

use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use followsync::Config;

pub const TEST_USER: &str = "octocat";

/// Test configuration helper
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("followsync").join("config.txt");

        Self {
            temp_dir,
            config_path,
        }
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        std::fs::create_dir_all(self.config_path.parent().unwrap())
            .expect("Failed to create config dir");
        std::fs::write(&self.config_path, content).expect("Failed to write test config");
        self.config_path.clone()
    }

    /// Config file pointing at a mock server with no retry delay
    pub fn create_config_for(&self, server: &MockServer, blacklist: &str) -> PathBuf {
        let content = format!(
            "GITHUB_TOKEN=ghp_test\n\
             GITHUB_USERNAME={}\n\
             BLACKLIST={}\n\
             RETRY_DELAY_SECS=0\n\
             API_URL={}\n",
            TEST_USER,
            blacklist,
            server.uri()
        );
        self.create_test_config(&content)
    }
}

/// In-memory config aimed at a mock server
pub fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.token = Some("ghp_test".to_string());
    config.username = Some(TEST_USER.to_string());
    config.api_url = server.uri();
    config.retry_delay_secs = 0;
    config
}

/// `count` logins named `{prefix}000`, `{prefix}001`, ...
pub fn logins(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}{:03}", prefix, i)).collect()
}

/// Mock GitHub that serves follower/following pages, quota and mutations
pub struct MockGitHub {
    pub server: MockServer,
}

impl MockGitHub {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    pub fn config(&self) -> Config {
        config_for(&self.server)
    }

    /// Serve `names` in pages of 100, then an empty page
    pub async fn relation(&self, relation: &str, names: &[String]) {
        let pages: Vec<&[String]> = names.chunks(100).collect();
        for (index, chunk) in pages.iter().enumerate() {
            self.page(relation, index + 1, chunk).await;
        }
        self.page(relation, pages.len() + 1, &[]).await;
    }

    pub async fn page(&self, relation: &str, page: usize, names: &[String]) {
        let body: Vec<_> = names.iter().map(|n| json!({ "login": n })).collect();
        Mock::given(method("GET"))
            .and(path(format!("/users/{}/{}", TEST_USER, relation)))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(body)))
            .mount(&self.server)
            .await;
    }

    pub async fn quota(&self, remaining: u64) {
        Mock::given(method("GET"))
            .and(path("/rate_limit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resources": {
                    "core": { "limit": 5000, "remaining": remaining, "reset": 1_700_003_600 }
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Every follow and unfollow answers `status`
    pub async fn mutations(&self, status: u16) {
        for verb in ["PUT", "DELETE"] {
            Mock::given(method(verb))
                .and(path_regex(r"^/user/following/[^/]+$"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&self.server)
                .await;
        }
    }

    /// Requests received with the given HTTP method
    pub async fn received(&self, verb: &str) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.method.to_string() == verb)
            .map(|r| r.url.path().to_string())
            .collect()
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
