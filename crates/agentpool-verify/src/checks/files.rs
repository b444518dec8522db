//! `files_modified` check (spec §4.D, check 2).

use super::run_with_timeout;
use agentpool_shared::types::{CheckResult, TaskClaims};
use std::path::Path;
use std::time::Duration;

/// "claimed ends with actual OR actual ends with claimed" (spec §4.D).
fn suffix_equivalent(claimed: &str, actual: &str) -> bool {
    claimed.ends_with(actual) || actual.ends_with(claimed)
}

pub async fn run(dir: &Path, claims: &TaskClaims, timeout: Duration) -> CheckResult {
    let name = "files_modified".to_string();

    let output = match run_with_timeout(
        dir,
        "git",
        &["diff", "--name-only", "HEAD~1", "HEAD"],
        timeout,
    )
    .await
    {
        Ok(Some(output)) if output.status.success() => output,
        Ok(Some(output)) => {
            return CheckResult {
                name,
                passed: false,
                expected: claims.files_modified.join(", "),
                actual: "git diff failed".to_string(),
                details: Some(String::from_utf8_lossy(&output.stderr).to_string()),
            }
        }
        Ok(None) => {
            return CheckResult {
                name,
                passed: false,
                expected: claims.files_modified.join(", "),
                actual: "timed out".to_string(),
                details: None,
            }
        }
        Err(err) => {
            return CheckResult {
                name,
                passed: false,
                expected: claims.files_modified.join(", "),
                actual: "unable to run git".to_string(),
                details: Some(err.to_string()),
            }
        }
    };

    let actual_paths: Vec<String> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect();

    let missing: Vec<String> = claims
        .files_modified
        .iter()
        .filter(|claimed| {
            !actual_paths
                .iter()
                .any(|actual| suffix_equivalent(claimed, actual))
        })
        .cloned()
        .collect();

    let passed = missing.is_empty();
    CheckResult {
        name,
        passed,
        expected: claims.files_modified.join(", "),
        actual: actual_paths.join(", "),
        details: if missing.is_empty() {
            None
        } else {
            Some(format!("missing claimed files: {}", missing.join(", ")))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_rule_matches_either_direction() {
        assert!(suffix_equivalent("src/x.ts", "x.ts"));
        assert!(suffix_equivalent("x.ts", "repo/src/x.ts"));
        assert!(!suffix_equivalent("src/x.ts", "src/y.ts"));
    }
}
