//! Workspace-level end-to-end scenarios (gated behind `test-db`, requires a
//! reachable `DATABASE_URL`). Covers the scenarios not already exercised
//! closer to the unit under test: `agentpool-coordinator/tests/scenarios_test.rs`
//! carries S1 and S2; `agentpool-verify/tests/pipeline_integration_test.rs`
//! carries an isolated check-level version of S3. These four drive the whole
//! coordinator the way the scenario narrative describes it.

#![cfg(feature = "test-db")]

use agentpool_coordinator::{Callbacks, Coordinator};
use agentpool_shared::config::AgentPoolConfig;
use agentpool_shared::messages::{
    channels, AgentHeartbeat, AgentRegister, AgentStatusChange, CurrentTaskRef, Stop, SystemInfo,
    TaskDispatch, TaskResult,
};
use agentpool_shared::types::{
    AgentId, AgentStatus, Capabilities, Priority, TaskClaims, TaskId, TaskPayload,
};
use chrono::Utc;
use sqlx::PgPool;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

fn config_with(heartbeat_timeout_ms: u64, max_attempts: u32) -> AgentPoolConfig {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL set for test-db tests");
    AgentPoolConfig {
        database_url: Some(database_url),
        heartbeat_timeout_ms,
        max_attempts,
        ..AgentPoolConfig::default()
    }
}

async fn bootstrapped(config: AgentPoolConfig) -> Coordinator {
    let coordinator = Coordinator::bootstrap(config).await.expect("bootstrap");
    coordinator.start();
    coordinator
}

async fn notify<T: serde::Serialize>(pool: &PgPool, channel: &str, payload: &T) {
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(channel)
        .bind(serde_json::to_string(payload).unwrap())
        .execute(pool)
        .await
        .expect("notify");
}

async fn register_agent(pool: &PgPool, agent_id: &str) {
    let msg = AgentRegister {
        agent_id: AgentId::from(agent_id),
        capabilities: Capabilities::default(),
        system: SystemInfo {
            hostname: "test-host".into(),
            platform: "linux".into(),
            memory: 0,
            cpus: 1,
        },
        timestamp: Utc::now(),
    };
    notify(pool, channels::AGENT_REGISTER, &msg).await;
    // Give the coordinator's listener loop a moment to register the agent
    // before the test submits work.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

/// Reports the agent idle again, the way it would after finishing and
/// submitting its `task.result`. The registry only frees an agent's slot on
/// an explicit status change, never implicitly on `task.result`.
async fn mark_agent_idle(pool: &PgPool, agent_id: &str) {
    let msg = AgentStatusChange {
        agent_id: AgentId::from(agent_id),
        previous_status: AgentStatus::Busy,
        current_status: AgentStatus::Idle,
        reason: "result submitted".into(),
        timestamp: Utc::now(),
    };
    notify(pool, channels::AGENT_STATUS, &msg).await;
    tokio::time::sleep(Duration::from_millis(300)).await;
}

async fn publish_result(pool: &PgPool, agent_id: &str, task_id: &TaskId, claims: TaskClaims) {
    let result = TaskResult {
        task_id: task_id.clone(),
        agent_id: AgentId::from(agent_id),
        success: true,
        claims,
        summary: "reported".into(),
        error: None,
        start_time: Utc::now(),
        end_time: Utc::now(),
        duration_ms: 5,
    };
    notify(pool, channels::TASK_RESULT, &result).await;
}

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

fn lying_claims() -> TaskClaims {
    TaskClaims {
        commits_created: 2,
        files_modified: vec!["src/x.ts".to_string()],
        tests_run: false,
        tests_passed: false,
        summary: "claims work that never happened".into(),
    }
}

async fn spawn_dispatch_listener(pool: PgPool, agent_id: &str) -> mpsc::Receiver<TaskDispatch> {
    let (tx, rx) = mpsc::channel(8);
    let channel = channels::task_dispatch_for(agent_id);
    tokio::spawn(async move {
        let mut listener = sqlx::postgres::PgListener::connect_with(&pool).await.unwrap();
        listener.listen(&channel).await.unwrap();
        while let Ok(notification) = listener.recv().await {
            let dispatch: TaskDispatch = serde_json::from_str(notification.payload()).unwrap();
            if tx.send(dispatch).await.is_err() {
                break;
            }
        }
    });
    rx
}

/// Scenario S3: verification catches a lying claim. The agent reports
/// success with claims the working directory doesn't back up; both relevant
/// checks fail, the task is marked failed, and recovery re-dispatches it
/// with a recovery context describing attempt 2.
#[tokio::test]
async fn verification_catches_a_lying_claim_and_retries_with_context() {
    let config = config_with(15_000, 3);
    let pool = PgPool::connect(config.database_url.as_ref().unwrap()).await.unwrap();
    let coordinator = bootstrapped(config).await;

    register_agent(&pool, "s3-agent").await;
    let mut dispatches = spawn_dispatch_listener(pool.clone(), "s3-agent").await;

    let repo = tempdir().unwrap();
    init_repo(repo.path());

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Normal,
            TaskPayload {
                prompt: "add a feature".into(),
                codebase_id: None,
                worktree_path: Some(repo.path().to_string_lossy().to_string()),
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    let first = tokio::time::timeout(Duration::from_secs(3), dispatches.recv())
        .await
        .expect("first dispatch arrives")
        .expect("dispatch payload");
    assert_eq!(first.task_id, task_id);
    assert!(first.task.context.is_none());

    publish_result(&pool, "s3-agent", &task_id, lying_claims()).await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    mark_agent_idle(&pool, "s3-agent").await;

    let retry = tokio::time::timeout(Duration::from_secs(3), dispatches.recv())
        .await
        .expect("retry dispatch arrives")
        .expect("dispatch payload");
    assert_eq!(retry.task_id, task_id);
    let context = retry.task.context.expect("retry carries recovery context");
    assert_eq!(context.previous_attempts, 1);
    assert!(context.recovery_hints.iter().any(|h| h == "commits_created"));
    assert!(context.recovery_hints.iter().any(|h| h == "files_modified"));

    let snapshot = coordinator.pool_snapshot().await.expect("snapshot");
    assert!(snapshot.tasks.failed >= 1);

    coordinator.stop().await;
}

/// Scenario S4: an agent stops heartbeating mid-task. The liveness sweep
/// evicts it, fires `onAgentDead`, and the task it owned flows through
/// recovery as a retry (back onto the durable queue, since no other agent
/// is idle to take it immediately).
#[tokio::test]
async fn agent_death_mid_task_evicts_agent_and_retries_task() {
    let config = config_with(2_000, 3);
    let pool = PgPool::connect(config.database_url.as_ref().unwrap()).await.unwrap();
    let coordinator = bootstrapped(config).await;

    let dead_seen: Arc<Mutex<Option<AgentId>>> = Arc::new(Mutex::new(None));
    let dead_seen_cb = dead_seen.clone();
    coordinator
        .set_handlers(Callbacks::new().on_agent_dead(move |agent_id| {
            *dead_seen_cb.lock().unwrap() = Some(agent_id);
        }))
        .await;

    register_agent(&pool, "s4-agent").await;
    let mut dispatches = spawn_dispatch_listener(pool.clone(), "s4-agent").await;

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Normal,
            TaskPayload {
                prompt: "will go unheard".into(),
                codebase_id: None,
                worktree_path: None,
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    let dispatch = tokio::time::timeout(Duration::from_secs(3), dispatches.recv())
        .await
        .expect("dispatch arrives")
        .expect("dispatch payload");
    assert_eq!(dispatch.task_id, task_id);

    // No heartbeat ever follows; wait past the 2s heartbeat timeout and a
    // full 5s liveness-sweep tick.
    tokio::time::sleep(Duration::from_secs(7)).await;

    assert_eq!(*dead_seen.lock().unwrap(), Some(AgentId::from("s4-agent")));

    let snapshot = coordinator.pool_snapshot().await.expect("snapshot");
    assert!(!snapshot.agents.iter().any(|a| a.agent_id == AgentId::from("s4-agent")));
    assert!(snapshot.tasks.failed >= 1);
    assert!(snapshot.tasks.queued >= 1);

    coordinator.stop().await;
}

/// Scenario S5: a task that keeps failing burns through the retry budget
/// and escalates instead of retrying a fourth time. `onEscalation` fires
/// exactly once, carrying all three recorded attempts.
#[tokio::test]
async fn escalates_after_retry_budget_exhausted() {
    let config = config_with(15_000, 3);
    let pool = PgPool::connect(config.database_url.as_ref().unwrap()).await.unwrap();
    let coordinator = bootstrapped(config).await;

    let escalation_count = Arc::new(AtomicU32::new(0));
    let last_escalation = Arc::new(Mutex::new(None));
    let count_cb = escalation_count.clone();
    let last_cb = last_escalation.clone();
    coordinator
        .set_handlers(Callbacks::new().on_escalation(move |info| {
            count_cb.fetch_add(1, Ordering::SeqCst);
            *last_cb.lock().unwrap() = Some(info);
        }))
        .await;

    register_agent(&pool, "s5-agent").await;
    let mut dispatches = spawn_dispatch_listener(pool.clone(), "s5-agent").await;

    let repo = tempdir().unwrap();
    init_repo(repo.path());

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Normal,
            TaskPayload {
                prompt: "keep failing".into(),
                codebase_id: None,
                worktree_path: Some(repo.path().to_string_lossy().to_string()),
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    for attempt in 1..=3u32 {
        let dispatch = tokio::time::timeout(Duration::from_secs(3), dispatches.recv())
            .await
            .unwrap_or_else(|_| panic!("dispatch for attempt {attempt} arrives"))
            .expect("dispatch payload");
        assert_eq!(dispatch.task_id, task_id);

        publish_result(&pool, "s5-agent", &task_id, lying_claims()).await;
        tokio::time::sleep(Duration::from_millis(400)).await;

        if attempt < 3 {
            mark_agent_idle(&pool, "s5-agent").await;
        }
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(escalation_count.load(Ordering::SeqCst), 1);

    let info = last_escalation.lock().unwrap().clone().expect("escalation recorded");
    assert_eq!(info.task_id, task_id);
    assert_eq!(info.attempts.len(), 3);
    assert_eq!(info.suggested_actions.len(), 3);

    coordinator.stop().await;
}

/// Scenario S6: stopping a running task is best-effort. The coordinator
/// publishes `control.stop.<agentId>` and returns, but the task's own status
/// stays whatever the agent last reported until a result or the liveness
/// timeout settles it — `StopTask` never forces a terminal status on a task
/// it doesn't own outright.
#[tokio::test]
async fn stop_is_best_effort_and_leaves_status_to_the_agent() {
    let config = config_with(15_000, 3);
    let pool = PgPool::connect(config.database_url.as_ref().unwrap()).await.unwrap();
    let coordinator = bootstrapped(config).await;

    register_agent(&pool, "s6-agent").await;
    let mut dispatches = spawn_dispatch_listener(pool.clone(), "s6-agent").await;

    let (stop_tx, mut stop_rx) = mpsc::channel(1);
    let stop_pool = pool.clone();
    tokio::spawn(async move {
        let mut listener = sqlx::postgres::PgListener::connect_with(&stop_pool).await.unwrap();
        listener.listen(&channels::control_stop_for("s6-agent")).await.unwrap();
        if let Ok(notification) = listener.recv().await {
            let stop: Stop = serde_json::from_str(notification.payload()).unwrap();
            let _ = stop_tx.send(stop).await;
        }
    });

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Normal,
            TaskPayload {
                prompt: "long running".into(),
                codebase_id: None,
                worktree_path: None,
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    let dispatch = tokio::time::timeout(Duration::from_secs(3), dispatches.recv())
        .await
        .expect("dispatch arrives")
        .expect("dispatch payload");
    assert_eq!(dispatch.task_id, task_id);

    // The agent reports in, the way a real one would after picking up work;
    // this is what moves the task to `running` in the first place.
    let heartbeat = AgentHeartbeat {
        agent_id: AgentId::from("s6-agent"),
        status: AgentStatus::Busy,
        current_task: Some(CurrentTaskRef { task_id: task_id.clone() }),
        resources: Default::default(),
        timestamp: Utc::now(),
    };
    notify(&pool, channels::AGENT_HEARTBEAT, &heartbeat).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    coordinator
        .stop_task(&task_id)
        .await
        .expect("stop_task succeeds even though it's best-effort");

    let stop_msg = tokio::time::timeout(Duration::from_secs(2), stop_rx.recv())
        .await
        .expect("stop signal arrives")
        .expect("stop payload");
    assert_eq!(stop_msg.agent_id, AgentId::from("s6-agent"));
    assert_eq!(stop_msg.task_id, task_id);

    // The task is still counted as running: `StopTask` didn't force it to a
    // terminal state on its own.
    let snapshot = coordinator.pool_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.tasks.running, 1);

    coordinator.stop().await;
}
