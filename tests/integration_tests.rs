mod common;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{assert_contains_all, logins, MockGitHub, TestEnvironment};
use followsync::confirm::render_summary;
use followsync::{
    ApiError, Config, FixedAnswer, GitHubClient, HealthCheck, Relation, RunOutcome, RunPhase,
    SyncEngine, SyncError,
};

// Scenario tests across fetch, plan, confirm, execute and report.
// Every test talks to a local mock of the GitHub REST API.

#[tokio::test]
async fn test_paginated_run_respects_quota_and_blacklist() {
    let github = MockGitHub::start().await;
    github.relation("followers", &logins("f", 150)).await;
    github
        .relation("following", &["f000".to_string(), "zed".to_string()])
        .await;
    // floor((130 - 100) / 3) = 10 actions
    github.quota(130).await;
    github.mutations(204).await;

    let env = TestEnvironment::new();
    let config_path = env.create_config_for(&github.server, "f001");
    let config = Config::load(&config_path).unwrap();

    let mut engine = SyncEngine::new(config).unwrap();
    let report = engine.run(&FixedAnswer(true)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.followers, 149);
    assert_eq!(report.summary.to_follow, 148);
    assert_eq!(report.summary.to_unfollow, 1);
    assert_eq!(report.summary.max_actions, 10);
    assert_eq!(report.execution.followed, logins("f", 12)[2..].to_vec());
    assert!(report.execution.unfollowed.is_empty());
    // 3 follower pages + 2 following pages + 10 follows
    assert_eq!(report.requests_made, 15);

    let puts = github.received("PUT").await;
    assert_eq!(puts.len(), 10);
    assert!(!puts.iter().any(|p| p.ends_with("/f001")));
    assert!(github.received("DELETE").await.is_empty());
    assert_eq!(engine.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn test_failed_user_is_reported_and_batch_continues() {
    let github = MockGitHub::start().await;
    github
        .relation("followers", &["alice".to_string(), "bob".to_string()])
        .await;
    github.relation("following", &["carol".to_string()]).await;
    github.quota(5000).await;

    Mock::given(method("PUT"))
        .and(path("/user/following/alice"))
        .respond_with(ResponseTemplate::new(422))
        .expect(3)
        .mount(&github.server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/user/following/bob"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&github.server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/user/following/carol"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&github.server)
        .await;

    let mut engine = SyncEngine::new(github.config()).unwrap();
    let report = engine.run(&FixedAnswer(true)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.execution.followed, vec!["bob".to_string()]);
    assert_eq!(report.execution.unfollowed, vec!["carol".to_string()]);
    assert_eq!(report.execution.failures.len(), 1);

    let failure = &report.execution.failures[0];
    assert_eq!(failure.username, "alice");
    assert_eq!(failure.attempts, 3);
    assert!(failure.to_string().contains("422"));
}

#[tokio::test]
async fn test_server_error_mid_pagination_aborts_without_mutations() {
    let github = MockGitHub::start().await;
    github.page("followers", 1, &logins("f", 100)).await;
    Mock::given(method("GET"))
        .and(path("/users/octocat/followers"))
        .and(wiremock::matchers::query_param("page", "2"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&github.server)
        .await;
    github.quota(5000).await;
    github.mutations(204).await;

    let mut engine = SyncEngine::new(github.config()).unwrap();
    let err = engine.run(&FixedAnswer(true)).await.unwrap_err();

    assert_matches!(
        err,
        SyncError::Fetch {
            relation: Relation::Followers,
            fetched: 100,
            ..
        }
    );
    assert!(github.received("PUT").await.is_empty());
    assert!(github.received("DELETE").await.is_empty());
    assert_eq!(engine.phase(), RunPhase::Idle);
}

#[tokio::test]
async fn test_quota_at_reserve_reports_without_actions() {
    let github = MockGitHub::start().await;
    github.relation("followers", &logins("f", 5)).await;
    github.relation("following", &logins("g", 5)).await;
    github.quota(100).await;
    github.mutations(204).await;

    let mut engine = SyncEngine::new(github.config()).unwrap();
    let report = engine.run(&FixedAnswer(true)).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::InsufficientQuota);
    assert_eq!(report.summary.max_actions, 0);
    assert_eq!(report.summary.follow_batch + report.summary.unfollow_batch, 0);
    assert_eq!(report.quota.map(|q| q.remaining), Some(100));
    assert!(github.received("PUT").await.is_empty());
    assert!(github.received("DELETE").await.is_empty());
}

#[tokio::test]
async fn test_dry_run_then_decline_makes_no_mutations() {
    let github = MockGitHub::start().await;
    github.relation("followers", &logins("f", 3)).await;
    github.relation("following", &logins("g", 2)).await;
    github.quota(5000).await;
    github.mutations(204).await;

    let mut engine = SyncEngine::new(github.config()).unwrap();
    let dry_run = engine.run_dry_run().await.unwrap();

    let text = render_summary(&dry_run.summary());
    assert_contains_all(
        &text,
        &[
            "Users to follow: 3 (this run: 3)",
            "Users to unfollow: 2 (this run: 2)",
            "API requests left: 5000",
        ],
    );
    assert!(github.received("PUT").await.is_empty());

    let report = engine.run_execute(&dry_run, &FixedAnswer(false)).await.unwrap();
    assert_eq!(report.outcome, RunOutcome::Declined);
    assert_eq!(report.execution.completed(), 0);
    assert!(github.received("PUT").await.is_empty());
    assert!(github.received("DELETE").await.is_empty());
}

#[tokio::test]
async fn test_blacklist_edits_survive_save_and_reload() {
    let github = MockGitHub::start().await;
    let env = TestEnvironment::new();
    let config_path = env.create_config_for(&github.server, "torvalds");
    std::fs::write(
        &config_path,
        format!(
            "{}NOTES='keep me around'\n",
            std::fs::read_to_string(&config_path).unwrap()
        ),
    )
    .unwrap();

    let mut engine = SyncEngine::new(Config::load(&config_path).unwrap()).unwrap();
    engine
        .set_blacklist(["torvalds", "gvanrossum", " "])
        .unwrap();
    engine.save_config(&config_path).unwrap();

    let reloaded = Config::load(&config_path).unwrap();
    assert_eq!(reloaded.blacklist.len(), 2);
    assert!(reloaded.blacklist.contains("gvanrossum"));
    assert_eq!(reloaded.token.as_deref(), Some("ghp_test"));
    assert_eq!(reloaded.username.as_deref(), Some("octocat"));
    assert_eq!(reloaded.api_url, github.server.uri());
    assert!(std::fs::read_to_string(&config_path)
        .unwrap()
        .contains("NOTES=\"keep me around\""));

    engine.set_blacklist(Vec::<String>::new()).unwrap();
    engine.load_config(&config_path).unwrap();
    assert_eq!(engine.blacklist(), &reloaded.blacklist);
}

#[tokio::test]
async fn test_rejected_token_is_auth_error() {
    let github = MockGitHub::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "message": "Bad credentials" })),
        )
        .expect(1)
        .mount(&github.server)
        .await;

    let client = GitHubClient::new(&github.config()).unwrap();
    let err = client.validate_token().await.unwrap_err();

    assert_matches!(&err, ApiError::Auth(message) if message.contains("Bad credentials"));
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn test_missing_token_fails_without_a_call() {
    let github = MockGitHub::start().await;
    let mut config = github.config();
    config.token = None;

    let client = GitHubClient::new(&config).unwrap();
    assert_matches!(client.validate_token().await, Err(ApiError::Auth(_)));
    assert!(github.server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_doctor_passes_against_healthy_account() {
    let github = MockGitHub::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .mount(&github.server)
        .await;
    github.quota(4200).await;

    let env = TestEnvironment::new();
    let config_path = env.create_config_for(&github.server, "");
    let config = Config::load(&config_path).unwrap();

    let health = HealthCheck::run(&config, &config_path).await;

    assert!(health.all_passed());
    assert!(health.errors().is_empty());
    assert!(health.warnings().is_empty());
    assert_eq!(health.github_auth.details.as_deref(), Some("Username: octocat"));
}

#[tokio::test]
async fn test_doctor_flags_missing_config_and_low_quota() {
    let github = MockGitHub::start().await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "login": "octocat" })))
        .mount(&github.server)
        .await;
    github.quota(50).await;

    let env = TestEnvironment::new();
    let health = HealthCheck::run(&github.config(), &env.config_path).await;

    assert!(!health.all_passed());
    assert_eq!(health.errors().len(), 1);
    assert!(!health.config_file.passed);
    assert!(health.quota.is_warning);
}
