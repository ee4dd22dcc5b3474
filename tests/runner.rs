mod common;

use common::{DR_HOST, FakeApi, FakeEngine, PROD_HOST, target};
use registry_replicator::cli::{Collaborators, PreAuthenticator, RunMode, Runner};
use registry_replicator::common::{InterruptFlag, RetryPolicy};
use registry_replicator::config::TargetEnvironment;
use registry_replicator::engine::{OperationKind, TransferExecutor};
use registry_replicator::logging::Logger;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;

const MIRROR_CONFIG: &str = r#"
allowed_source_registries = ["sourcehost/proj"]

[registries.prod]
url = "quay-prod.example.com"
namespace = "mirror_ns"
api_token_env = "QUAY_PROD_TOKEN"
username_env = "QUAY_PROD_USER"
password_env = "QUAY_PROD_PASSWORD"

[registries.dr]
url = "quay-dr.example.com"
namespace = "mirror_ns"
api_token_env = "QUAY_DR_TOKEN"

[[images]]
source = "sourcehost/proj/repo:abc123"
targets = ["prod", "dr"]
description = "Main service"

[operation]
retry_delay = 0
create_repos_if_not_exists = true
"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn environment(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    let values: HashMap<String, String> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    move |name| values.get(name).cloned()
}

fn full_environment() -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
    environment(&[
        ("QUAY_PROD_TOKEN", "prod-token"),
        ("QUAY_DR_TOKEN", "dr-token"),
        ("QUAY_PROD_USER", "robot"),
        ("QUAY_PROD_PASSWORD", "secret"),
    ])
}

fn collaborators(engine: &Arc<FakeEngine>, api: &Arc<FakeApi>) -> Collaborators {
    Collaborators {
        engine: Some(engine.clone()),
        api: Some(api.clone()),
        interrupt: InterruptFlag::new(),
    }
}

#[tokio::test]
async fn test_mirror_run_end_to_end() {
    let file = config_file(MIRROR_CONFIG);
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());
    let logger = Logger::capturing();

    let code = Runner::new(RunMode::Mirror, file.path().to_path_buf(), full_environment())
        .with_logger(logger.clone())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert!(engine.has_remote("quay-prod.example.com/mirror_ns/proj/repo:abc123"));
    assert!(engine.has_remote("quay-dr.example.com/mirror_ns/proj/repo:latest"));
    assert_eq!(api.create_requests().len(), 2);
    // Only prod has login credentials configured
    assert_eq!(engine.targets_of(OperationKind::Login), vec![PROD_HOST]);
    assert_eq!(logger.records_with_code("MISSION_SUCCESS").len(), 1);
}

#[tokio::test]
async fn test_stop_during_push_exits_with_interrupt_code() {
    let file = config_file(MIRROR_CONFIG);
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());
    let interrupt = InterruptFlag::new();
    engine.interrupt_on(OperationKind::Push, &interrupt);
    let logger = Logger::capturing();

    let code = Runner::new(RunMode::Mirror, file.path().to_path_buf(), full_environment())
        .with_logger(logger.clone())
        .run_with(Collaborators {
            engine: Some(engine.clone()),
            api: Some(api.clone()),
            interrupt,
        })
        .await
        .unwrap();

    assert_eq!(code, 130);
    assert_eq!(engine.count(OperationKind::Push), 1);
    // Provisioning for dr never starts once the stop is requested
    assert_eq!(api.create_requests().len(), 1);
    assert_eq!(logger.records_with_code("USER_STOP").len(), 1);
}

#[tokio::test]
async fn test_missing_token_stops_before_any_call() {
    let file = config_file(MIRROR_CONFIG);
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());
    let logger = Logger::capturing();
    let lookup = environment(&[("QUAY_PROD_TOKEN", "prod-token")]);

    let code = Runner::new(RunMode::Mirror, file.path().to_path_buf(), lookup)
        .with_logger(logger.clone())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(engine.calls().is_empty());
    assert!(api.create_requests().is_empty());
    assert!(
        logger
            .records_with_code("CONFIG_INVALID")
            .iter()
            .any(|record| record.message.contains("dr"))
    );
}

#[tokio::test]
async fn test_placeholder_token_is_rejected() {
    let file = config_file(MIRROR_CONFIG);
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());
    let lookup = environment(&[
        ("QUAY_PROD_TOKEN", "prod-token"),
        ("QUAY_DR_TOKEN", "YOUR_DR_TOKEN_HERE"),
    ]);

    let code = Runner::new(RunMode::Mirror, file.path().to_path_buf(), lookup)
        .with_logger(Logger::capturing())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_unreadable_config_exits_with_failure() {
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());
    let logger = Logger::capturing();
    let dir = tempfile::tempdir().unwrap();

    let code = Runner::new(RunMode::Mirror, dir.path().join("missing.toml"), full_environment())
        .with_logger(logger.clone())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(engine.calls().is_empty());
    assert_eq!(logger.records_with_code("CONFIG_INVALID").len(), 1);
}

#[tokio::test]
async fn test_env_override_disables_continue_on_error() {
    let file = config_file(&MIRROR_CONFIG.replace(
        r#"targets = ["prod", "dr"]"#,
        r#"targets = ["prod", "dr"]

[[images]]
source = "sourcehost/proj/other:1"
targets = ["dr"]"#,
    ));
    let engine = Arc::new(FakeEngine::new());
    engine.fail(
        OperationKind::Pull,
        "sourcehost/proj/repo:abc123",
        3,
        common::Failure::Exit("manifest unknown".into()),
    );
    let api = Arc::new(FakeApi::new());
    let lookup = environment(&[
        ("QUAY_PROD_TOKEN", "prod-token"),
        ("QUAY_DR_TOKEN", "dr-token"),
        ("REPLICATOR_CONTINUE_ON_ERROR", "false"),
    ]);

    let code = Runner::new(RunMode::Mirror, file.path().to_path_buf(), lookup)
        .with_logger(Logger::capturing())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(!engine.touched("other"));
}

const SYNC_CONFIG: &str = r#"
[registries.prod]
url = "quay-prod.example.com"
namespace = "mirror_ns"
api_token = "prod-token"

[registries.dr]
url = "quay-dr.example.com"
namespace = "mirror_ns"
api_token = "dr-token"

[operation]
retry_delay = 0

[sync]
source = "prod"
destination = "dr"
"#;

#[tokio::test]
async fn test_sync_run_end_to_end() {
    let file = config_file(SYNC_CONFIG);
    let engine = Arc::new(
        FakeEngine::new()
            .with_remote("quay-prod.example.com/mirror_ns/team/app:v1")
            .with_remote("quay-prod.example.com/mirror_ns/team/app:v2")
            .with_remote("quay-dr.example.com/mirror_ns/team/app:v1"),
    );
    let api = Arc::new(FakeApi::new());
    api.repository_page(&["team/app"], false);
    api.tag_page("team/app", &["v1", "v2"], false);
    let logger = Logger::capturing();

    let code = Runner::new(RunMode::Sync, file.path().to_path_buf(), environment(&[]))
        .with_logger(logger.clone())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 0);
    assert!(engine.has_remote("quay-dr.example.com/mirror_ns/team/app:v2"));
    assert!(engine.local_images().is_empty());
    assert!(api.create_requests().is_empty());
}

#[tokio::test]
async fn test_sync_requires_distinct_registries() {
    let file = config_file(&SYNC_CONFIG.replace(r#"destination = "dr""#, r#"destination = "prod""#));
    let engine = Arc::new(FakeEngine::new());
    let api = Arc::new(FakeApi::new());

    let code = Runner::new(RunMode::Sync, file.path().to_path_buf(), environment(&[]))
        .with_logger(Logger::capturing())
        .run_with(collaborators(&engine, &api))
        .await
        .unwrap();

    assert_eq!(code, 1);
    assert!(api.repository_requests().is_empty());
}

fn with_login(mut target: TargetEnvironment, user_env: &str, pass_env: &str) -> TargetEnvironment {
    target.username_env = Some(user_env.to_string());
    target.password_env = Some(pass_env.to_string());
    target
}

fn login_executor(engine: &Arc<FakeEngine>, logger: &Logger) -> TransferExecutor {
    TransferExecutor::new(
        engine.clone(),
        RetryPolicy::new(3, Duration::ZERO),
        Duration::from_secs(5),
        logger.clone(),
    )
}

#[tokio::test]
async fn test_login_once_per_host() {
    let engine = Arc::new(FakeEngine::new());
    let logger = Logger::capturing();
    let executor = login_executor(&engine, &logger);
    let prod = with_login(target("prod", PROD_HOST), "USER", "PASS");
    let prod_alias = with_login(target("prod-alias", PROD_HOST), "USER", "PASS");
    let lookup = environment(&[("USER", "robot"), ("PASS", "secret")]);

    let summary = PreAuthenticator::new(&executor, logger.clone())
        .login_all(&[&prod, &prod_alias], &lookup)
        .await;

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 1);
    let logins = engine.calls_of(OperationKind::Login);
    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].stdin.as_deref(), Some("secret"));
    assert!(!logins[0].args.contains(&"secret".to_string()));
}

#[tokio::test]
async fn test_login_problems_never_abort() {
    let engine = Arc::new(FakeEngine::new());
    engine.fail(
        OperationKind::Login,
        DR_HOST,
        1,
        common::Failure::Exit("unauthorized: incorrect username or password".into()),
    );
    let logger = Logger::capturing();
    let executor = login_executor(&engine, &logger);
    let dr = with_login(target("dr", DR_HOST), "DR_USER", "DR_PASS");
    let unset = with_login(target("qa", "quay-qa.example.com"), "QA_USER", "QA_PASS");
    let bare = target("stage", "quay-stage.example.com");
    let lookup = environment(&[("DR_USER", "robot"), ("DR_PASS", "wrong")]);

    let summary = PreAuthenticator::new(&executor, logger.clone())
        .login_all(&[&dr, &unset, &bare], &lookup)
        .await;

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.skipped, 2);
    // Login is a single attempt
    assert_eq!(engine.count(OperationKind::Login), 1);
    assert_eq!(logger.records_with_code("LOGIN_FAILED").len(), 1);
    assert_eq!(logger.records_with_code("LOGIN_NO_CREDENTIALS").len(), 2);
}
