//! Token extraction for `RecoveryContext::failure_patterns` (spec §4.E).
//!
//! A small heuristic, not a parser: callers get "what to avoid" hints, not a
//! structured diagnosis. Styled after the telemetry-driven thresholds in
//! `examples/TheFermiSea-beefcake-swarm/coordination/src/escalation/heuristics.rs`,
//! but simpler — there's no corpus of historical sessions here, just the
//! attempt history of one task.

use agentpool_shared::types::AttemptRecord;
use std::collections::BTreeSet;

/// Extracts a de-duplicated, stable-ordered set of tokens from prior attempts:
/// every failing check name, plus the first word of each error message (often
/// the error class, e.g. "timeout" or "AssertionError").
pub fn extract(history: &[AttemptRecord]) -> Vec<String> {
    let mut tokens: BTreeSet<String> = BTreeSet::new();

    for attempt in history {
        for check in &attempt.failing_checks {
            tokens.insert(check.clone());
        }
        if let Some(first_word) = attempt.error_message.split_whitespace().next() {
            let trimmed = first_word.trim_matches(|c: char| !c.is_alphanumeric());
            if !trimmed.is_empty() {
                tokens.insert(trimmed.to_string());
            }
        }
    }

    tokens.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentpool_shared::types::{AgentId, TaskId};
    use chrono::Utc;

    fn attempt(error_message: &str, failing_checks: &[&str]) -> AttemptRecord {
        AttemptRecord {
            task_id: TaskId::from("t1"),
            attempt_number: 1,
            agent_id: AgentId::from("a1"),
            error_message: error_message.to_string(),
            failing_checks: failing_checks.iter().map(|s| s.to_string()).collect(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn dedupes_and_sorts_tokens() {
        let history = vec![
            attempt("timeout waiting for build", &["tests_pass"]),
            attempt("timeout again", &["tests_pass", "types_valid"]),
        ];
        let tokens = extract(&history);
        assert_eq!(tokens, vec!["tests_pass", "timeout", "types_valid"]);
    }

    #[test]
    fn empty_history_yields_no_tokens() {
        assert!(extract(&[]).is_empty());
    }
}
