use crate::output;
use agentpool_bus::{DurableQueue, MessageBus};
use agentpool_shared::messages::{channels, Stop};
use agentpool_shared::types::{Priority, Task, TaskId, TaskPayload, TaskStatus};
use agentpool_store::TaskStore;
use chrono::Utc;

pub async fn submit(
    store: &TaskStore,
    queue: &DurableQueue,
    prompt: String,
    priority: Priority,
    codebase_id: Option<String>,
    worktree_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let task_id = TaskId::generate();
    let payload = TaskPayload {
        prompt,
        codebase_id,
        worktree_path,
        task_type: None,
        extra: serde_json::Value::Null,
    };
    let task = Task::new(task_id.clone(), priority, payload);

    store.create(&task).await?;
    queue.enqueue(&task_id, priority.score()).await?;

    output::label("task id", &task_id);
    Ok(())
}

pub async fn status(store: &TaskStore, task_id: TaskId) -> Result<(), Box<dyn std::error::Error>> {
    let task = store.get(&task_id).await?;

    output::label("task id", &task.task_id);
    output::label("status", task.status.to_string());
    output::label("priority", task.priority.to_string());
    output::label("attempts", task.attempts);
    if let Some(agent_id) = &task.assigned_agent_id {
        output::label("assigned agent", agent_id);
    }
    if let Some(result) = &task.result {
        output::blank();
        output::header("result:");
        output::label("  success", if result.success { "true" } else { "false" });
        output::label("  summary", &result.summary);
        if let Some(err) = &result.error {
            output::label("  error", &err.message);
        }
    }
    Ok(())
}

pub async fn stop(
    store: &TaskStore,
    queue: &DurableQueue,
    bus: &MessageBus,
    task_id: TaskId,
) -> Result<(), Box<dyn std::error::Error>> {
    let task = store.get(&task_id).await?;

    if task.status.is_terminal() {
        output::label("status", format!("already {}", task.status));
        return Ok(());
    }

    queue.remove(&task_id).await?;

    // A task already handed to an agent only gets the stop signal — its
    // status stays whatever the agent last reported until it publishes a
    // result or misses its heartbeat deadline. Only a still-queued task (no
    // owner yet) is cancelled outright.
    if let Some(agent_id) = &task.assigned_agent_id {
        let msg = Stop {
            agent_id: agent_id.clone(),
            task_id: task_id.clone(),
            reason: "stop requested via agentpool-ctl".to_string(),
            timestamp: Utc::now(),
        };
        bus.publish(&channels::control_stop_for(&agent_id.0), &msg).await?;
        output::label("status", "stop signal sent, agent owns the task");
        return Ok(());
    }

    store
        .update_status(&task_id, TaskStatus::Cancelled, Default::default())
        .await?;

    output::label("status", "cancelled");
    Ok(())
}

pub async fn snapshot(
    store: &TaskStore,
    queue: &DurableQueue,
) -> Result<(), Box<dyn std::error::Error>> {
    let queued = queue.len().await?;
    let active = store.list_active().await?;

    let dispatched = active.iter().filter(|t| t.status == TaskStatus::Dispatched).count();
    let running = active.iter().filter(|t| t.status == TaskStatus::Running).count();
    let verifying = active.iter().filter(|t| t.status == TaskStatus::Verifying).count();

    output::header("queue:");
    output::label("  queued", queued);
    output::blank();
    output::header("active tasks:");
    output::label("  dispatched", dispatched);
    output::label("  running", running);
    output::label("  verifying", verifying);
    output::blank();
    output::header("note: agent liveness is tracked in the coordinator process only");
    Ok(())
}
