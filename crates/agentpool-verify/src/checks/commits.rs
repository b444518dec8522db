//! `commits_created` check (spec §4.D, check 1).

use super::run_with_timeout;
use agentpool_shared::types::{CheckResult, TaskClaims};
use std::path::Path;
use std::time::Duration;

pub async fn run(
    dir: &Path,
    count_before: u64,
    claims: &TaskClaims,
    timeout: Duration,
) -> CheckResult {
    let name = "commits_created".to_string();

    let output = match run_with_timeout(dir, "git", &["rev-list", "--count", "HEAD"], timeout).await
    {
        Ok(Some(output)) if output.status.success() => output,
        Ok(Some(output)) => {
            return CheckResult {
                name,
                passed: false,
                expected: format!(">= {}", claims.commits_created),
                actual: "git rev-list failed".to_string(),
                details: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            }
        }
        Ok(None) => {
            return CheckResult {
                name,
                passed: false,
                expected: format!(">= {}", claims.commits_created),
                actual: "timed out".to_string(),
                details: None,
            }
        }
        Err(err) => {
            return CheckResult {
                name,
                passed: false,
                expected: format!(">= {}", claims.commits_created),
                actual: "unable to run git".to_string(),
                details: Some(err.to_string()),
            }
        }
    };

    let count_now: u64 = String::from_utf8_lossy(&output.stdout)
        .trim()
        .parse()
        .unwrap_or(count_before);
    let delta = count_now.saturating_sub(count_before);
    let passed = delta >= claims.commits_created;

    CheckResult {
        name,
        passed,
        expected: format!(">= {}", claims.commits_created),
        actual: format!("{delta}"),
        details: Some(format!(
            "commit count before={count_before} now={count_now} delta={delta}"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn init_repo(dir: &Path) {
        StdCommand::new("git").arg("init").current_dir(dir).output().unwrap();
        StdCommand::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir)
            .output()
            .unwrap();
        StdCommand::new("git")
            .args(["config", "user.name", "test"])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    fn commit(dir: &Path, message: &str) {
        std::fs::write(dir.join("file.txt"), message).unwrap();
        StdCommand::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        StdCommand::new("git")
            .args(["commit", "-m", message])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    #[tokio::test]
    async fn passes_when_delta_meets_claim() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        commit(dir.path(), "one");
        commit(dir.path(), "two");

        let claims = TaskClaims {
            commits_created: 2,
            ..Default::default()
        };
        let result = run(dir.path(), 0, &claims, Duration::from_secs(5)).await;
        assert!(result.passed);
    }

    #[tokio::test]
    async fn fails_when_delta_below_claim() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        commit(dir.path(), "one");

        let claims = TaskClaims {
            commits_created: 2,
            ..Default::default()
        };
        let result = run(dir.path(), 0, &claims, Duration::from_secs(5)).await;
        assert!(!result.passed);
    }
}
