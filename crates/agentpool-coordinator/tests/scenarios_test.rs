//! End-to-end coordinator scenarios (gated behind `test-db`, requires a
//! reachable `DATABASE_URL`), exercising the dispatch/verify/recovery wiring
//! together the way `agentpool-store`'s and `agentpool-verify`'s own
//! integration tests exercise one component at a time.

#![cfg(feature = "test-db")]

use agentpool_coordinator::Coordinator;
use agentpool_shared::config::AgentPoolConfig;
use agentpool_shared::messages::{channels, AgentRegister, SystemInfo, TaskDispatch, TaskResult};
use agentpool_shared::types::{AgentId, Capabilities, Priority, TaskClaims, TaskPayload};
use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio::sync::mpsc;

async fn bootstrapped() -> Coordinator {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL set for test-db tests");
    let config = AgentPoolConfig {
        database_url: Some(database_url),
        heartbeat_timeout_ms: 2_000,
        max_attempts: 2,
        ..AgentPoolConfig::default()
    };
    let coordinator = Coordinator::bootstrap(config).await.expect("bootstrap");
    coordinator.start();
    coordinator
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
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(channels::AGENT_REGISTER)
        .bind(serde_json::to_string(&msg).unwrap())
        .execute(pool)
        .await
        .expect("notify");
    // Give the coordinator's listener loop a moment to pick up the
    // notification and register the agent before we submit work.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

/// Scenario S1: a registered idle agent is dispatched a submitted task, and
/// a successful `task.result` carrying true claims completes it.
#[tokio::test]
async fn happy_path_dispatch_and_complete() {
    let coordinator = bootstrapped().await;
    let database_url = std::env::var("DATABASE_URL").unwrap();
    let pool = PgPool::connect(&database_url).await.unwrap();

    register_agent(&pool, "s1-agent").await;

    let (tx, mut rx) = mpsc::channel(1);
    let listener_pool = pool.clone();
    tokio::spawn(async move {
        let mut listener = sqlx::postgres::PgListener::connect_with(&listener_pool).await.unwrap();
        listener.listen("task.dispatch.s1-agent").await.unwrap();
        if let Ok(Some(notification)) = listener.try_recv().await {
            let dispatch: TaskDispatch = serde_json::from_str(notification.payload()).unwrap();
            let _ = tx.send(dispatch).await;
        }
    });

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Normal,
            TaskPayload {
                prompt: "add a README".into(),
                codebase_id: None,
                worktree_path: None,
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    let dispatch = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("dispatch arrives")
        .expect("dispatch payload");
    assert_eq!(dispatch.task_id, task_id);

    let result = TaskResult {
        task_id: task_id.clone(),
        agent_id: AgentId::from("s1-agent"),
        success: true,
        claims: TaskClaims::default(),
        summary: "done".into(),
        error: None,
        start_time: Utc::now(),
        end_time: Utc::now(),
        duration_ms: 10,
    };
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(channels::TASK_RESULT)
        .bind(serde_json::to_string(&result).unwrap())
        .execute(&pool)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;

    let snapshot = coordinator.pool_snapshot().await.expect("snapshot");
    assert_eq!(snapshot.tasks.completed, 1);

    coordinator.stop().await;
}

/// Scenario S2: with no idle agent, a submitted task stays queued instead
/// of being dropped.
#[tokio::test]
async fn queues_under_pressure_when_no_agent_is_idle() {
    let coordinator = bootstrapped().await;

    let task_id = coordinator
        .submit_task(
            None,
            Priority::Low,
            TaskPayload {
                prompt: "no agents available".into(),
                codebase_id: None,
                worktree_path: None,
                task_type: None,
                extra: serde_json::Value::Null,
            },
        )
        .await
        .expect("submit");

    let snapshot = coordinator.pool_snapshot().await.expect("snapshot");
    assert!(snapshot.tasks.queued >= 1);

    // Task remains queued in the store too.
    let status = coordinator.stop_task(&task_id).await;
    assert!(status.is_ok());

    coordinator.stop().await;
}
