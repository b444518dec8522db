//! Pure validation of the task state machine (spec §4.C). Kept separate
//! from the `sqlx`-backed store so it is unit-testable without a database,
//! mirroring how the teacher isolates `task_finalization::state_handlers`
//! decision logic from the row-mutating service layer.

use agentpool_shared::types::TaskStatus;
use TaskStatus::*;

/// `true` iff transitioning from `from` to `to` is a legal edge of the
/// diagram in spec §4.C.
pub fn is_legal_transition(from: TaskStatus, to: TaskStatus) -> bool {
    matches!(
        (from, to),
        (Queued, Dispatched)
            | (Queued, Cancelled)
            | (Dispatched, Running)
            | (Dispatched, Cancelled)
            | (Dispatched, Verifying)
            | (Dispatched, Failed) // owner_dead or task_timeout before first heartbeat, recoverable
            | (Running, Verifying)
            | (Running, Cancelled)
            | (Running, Failed) // owner_dead or task_timeout, recoverable
            | (Verifying, Completed)
            | (Verifying, Failed)
            | (Failed, Dispatched) // recovery_retry, same taskId, new attempt
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        assert!(is_legal_transition(Queued, Dispatched));
        assert!(is_legal_transition(Dispatched, Running));
        assert!(is_legal_transition(Running, Verifying));
        assert!(is_legal_transition(Verifying, Completed));
    }

    #[test]
    fn retry_path_is_legal() {
        assert!(is_legal_transition(Verifying, Failed));
        assert!(is_legal_transition(Failed, Dispatched));
    }

    #[test]
    fn owner_dead_is_legal_from_dispatched_and_running() {
        assert!(is_legal_transition(Dispatched, Failed));
        assert!(is_legal_transition(Running, Failed));
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for terminal in [Completed, Cancelled] {
            for to in [Queued, Dispatched, Running, Verifying, Completed, Failed, Cancelled] {
                assert!(
                    !is_legal_transition(terminal, to),
                    "{terminal:?} -> {to:?} should be illegal"
                );
            }
        }
    }

    #[test]
    fn cannot_skip_dispatch() {
        assert!(!is_legal_transition(Queued, Running));
        assert!(!is_legal_transition(Queued, Verifying));
        assert!(!is_legal_transition(Queued, Completed));
    }

    #[test]
    fn failed_only_reopens_to_dispatched() {
        assert!(!is_legal_transition(Failed, Running));
        assert!(!is_legal_transition(Failed, Verifying));
        assert!(!is_legal_transition(Failed, Completed));
    }
}
