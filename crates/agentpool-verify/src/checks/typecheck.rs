//! `types_valid` check (spec §4.D, check 4).

use super::{run_with_timeout, split_command};
use crate::detect::detect_type_check_command;
use crate::truncate_tail;
use agentpool_shared::types::CheckResult;
use std::path::Path;
use std::time::Duration;

const STDERR_TAIL_BYTES: usize = 500;

pub async fn run(dir: &Path, override_command: Option<&str>, timeout: Duration) -> CheckResult {
    let name = "types_valid".to_string();

    let command =
        match override_command.map(str::to_string).or_else(|| detect_type_check_command(dir)) {
            Some(command) => command,
            None => {
                return CheckResult {
                    name,
                    passed: true,
                    expected: "exit code 0".to_string(),
                    actual: "no type-check command detected".to_string(),
                    details: None,
                }
            }
        };

    let Some((program, args)) = split_command(&command) else {
        return CheckResult {
            name,
            passed: false,
            expected: "exit code 0".to_string(),
            actual: format!("malformed type-check command: {command}"),
            details: None,
        };
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match run_with_timeout(dir, &program, &args, timeout).await {
        Ok(Some(output)) => {
            let passed = output.status.success();
            CheckResult {
                name,
                passed,
                expected: "exit code 0".to_string(),
                actual: format!("exit code {:?}", output.status.code()),
                details: if passed {
                    None
                } else {
                    Some(truncate_tail(&output.stderr, STDERR_TAIL_BYTES))
                },
            }
        }
        Ok(None) => CheckResult {
            name,
            passed: false,
            expected: "exit code 0".to_string(),
            actual: "timed out".to_string(),
            details: None,
        },
        Err(err) => CheckResult {
            name,
            passed: false,
            expected: "exit code 0".to_string(),
            actual: format!("unable to run `{command}`"),
            details: Some(err.to_string()),
        },
    }
}
