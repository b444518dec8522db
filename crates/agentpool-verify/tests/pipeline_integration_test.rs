use agentpool_shared::types::{TaskClaims, TaskId};
use agentpool_verify::{verify, VerifyRequestBuilder};
use std::process::Command;
use tempfile::tempdir;

fn init_repo(dir: &std::path::Path) {
    Command::new("git").arg("init").current_dir(dir).output().unwrap();
    Command::new("git")
        .args(["config", "user.email", "test@example.com"])
        .current_dir(dir)
        .output()
        .unwrap();
    Command::new("git")
        .args(["config", "user.name", "test"])
        .current_dir(dir)
        .output()
        .unwrap();
    std::fs::write(dir.join("README.md"), "hello").unwrap();
    Command::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
    Command::new("git")
        .args(["commit", "-m", "initial"])
        .current_dir(dir)
        .output()
        .unwrap();
}

/// Scenario S1: zero checks required when claims are empty.
#[tokio::test]
async fn no_claims_yields_trivially_successful_verdict() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());

    let request = VerifyRequestBuilder::new(
        TaskId::from("T1"),
        dir.path().to_path_buf(),
        TaskClaims::default(),
    )
    .commit_count_before(1)
    .build();

    let result = verify(&request).await.expect("verify runs");
    assert!(result.success);
    assert!(result.checks.is_empty());
}

/// Scenario S3: verification catches a lying claim — both checks run and
/// both fail, even though the first one already failed.
#[tokio::test]
async fn lying_claims_fail_every_relevant_check() {
    let dir = tempdir().unwrap();
    init_repo(dir.path());

    let claims = TaskClaims {
        commits_created: 2,
        files_modified: vec!["src/x.ts".to_string()],
        tests_run: false,
        tests_passed: false,
        summary: "did stuff".to_string(),
    };

    let request = VerifyRequestBuilder::new(TaskId::from("T1"), dir.path().to_path_buf(), claims)
        .commit_count_before(1)
        .build();

    let result = verify(&request).await.expect("verify runs");
    assert!(!result.success);
    let names = result.failing_check_names();
    assert!(names.contains(&"commits_created".to_string()));
    assert!(names.contains(&"files_modified".to_string()));
}
