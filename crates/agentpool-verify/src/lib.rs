//! # agentpool-verify
//!
//! Turns agent-reported [`TaskClaims`] into a [`VerificationResult`] by
//! running ground-truth checks against a working directory (spec §4.D).
//! Styled after the teacher's quality-gate pipeline in
//! `examples/TheFermiSea-beefcake-swarm/coordination/src/verifier/pipeline.rs`,
//! but — unlike that fail-fast gate pipeline — every check here runs
//! independently: a failing earlier check never skips a later one (spec
//! §4.D).

mod checks;
mod detect;
mod error;
mod pipeline;

pub use error::VerifyError;
pub use pipeline::{VerifyConfig, VerifyRequest, VerifyRequestBuilder};

use agentpool_shared::types::VerificationResult;
use std::time::Instant;
use tracing::instrument;

/// Runs the full check pipeline described in spec §4.D and returns the
/// aggregate verdict. Never propagates a subprocess failure out of the call
/// (spec §4.D "Failure modes") — an unrunnable check simply fails with a
/// descriptive `details`.
#[instrument(skip(request), fields(task_id = %request.task_id))]
pub async fn verify(request: &VerifyRequest) -> Result<VerificationResult, VerifyError> {
    let started = Instant::now();
    let overall = tokio::time::timeout(request.config.total_timeout, run_checks(request));

    let checks = match overall.await {
        Ok(checks) => checks,
        Err(_) => {
            return Ok(VerificationResult {
                success: false,
                checks: vec![agentpool_shared::types::CheckResult {
                    name: "overall_timeout".to_string(),
                    passed: false,
                    expected: format!("< {:?}", request.config.total_timeout),
                    actual: "exceeded wall-clock cap".to_string(),
                    details: None,
                }],
                duration_ms: started.elapsed().as_millis() as u64,
            })
        }
    };

    let success = checks.iter().all(|c| c.passed);
    Ok(VerificationResult {
        success,
        checks,
        duration_ms: started.elapsed().as_millis() as u64,
    })
}

async fn run_checks(request: &VerifyRequest) -> Vec<agentpool_shared::types::CheckResult> {
    let mut results = Vec::with_capacity(4);

    if request.claims.commits_created > 0 {
        results.push(
            checks::commits::run(&request.working_dir, request.commit_count_before, &request.claims, request.config.check_timeout)
                .await,
        );
    }

    if !request.claims.files_modified.is_empty() {
        results.push(
            checks::files::run(&request.working_dir, &request.claims, request.config.check_timeout).await,
        );
    }

    if request.config.run_tests {
        results.push(
            checks::tests::run(
                &request.working_dir,
                request.config.test_command.as_deref(),
                request.config.check_timeout,
            )
            .await,
        );
    }

    if request.config.run_type_check {
        results.push(
            checks::typecheck::run(
                &request.working_dir,
                request.config.type_check_command.as_deref(),
                request.config.check_timeout,
            )
            .await,
        );
    }

    results
}

pub(crate) fn truncate_tail(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).to_string()
}
