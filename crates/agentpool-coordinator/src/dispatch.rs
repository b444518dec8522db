//! Dispatch and recovery plumbing: the event handlers that drive the
//! scheduling loop (spec §4.F "Dispatch loop"). Handlers themselves are
//! synchronous (bus [`Handler`](agentpool_bus::Handler) callbacks); each one
//! spawns a task to do its async work, mirroring the fire-and-forget
//! dispatch used for tool-call forwarding in `examples/tasker-systems-tasker-core`'s
//! message handlers.

use crate::Coordinator;
use agentpool_shared::messages::{
    channels, AgentDeregister, AgentHeartbeat, AgentRegister, AgentStatusChange, Kill, Stop,
    TaskDispatch, TaskDispatchContext, TaskDispatchTask, TaskResult,
};
use agentpool_shared::types::{
    AgentId, AgentStatus, RecoveryContext, Task, TaskId, TaskResultError, TaskStatus,
};
use agentpool_store::TaskPatch;
use agentpool_verify::VerifyRequestBuilder;
use chrono::Utc;
use tracing::{error, info, warn};

impl Coordinator {
    /// spec §4.F step 1: `agent.register` → `Registry.Register`, then
    /// `ProcessQueue()`. Rejected outright once the pool is at `max_agents`
    /// (spec §6 "bounded pool") — the agent is simply never admitted, not
    /// killed or otherwise notified.
    pub(crate) async fn on_agent_register(&self, msg: AgentRegister) {
        let agent_id = msg.agent_id.clone();
        if !self.inner.registry.register(msg, self.inner.config.max_agents) {
            warn!(%agent_id, "agent registration rejected, pool at capacity");
            return;
        }
        info!(%agent_id, "agent registered");
        self.process_queue().await;
    }

    /// spec §4.F step 2: `agent.heartbeat` → `Registry.Heartbeat`; if the
    /// heartbeat references a task, mark it `running`.
    pub(crate) async fn on_agent_heartbeat(&self, msg: AgentHeartbeat) {
        let task_ref = msg.current_task.clone();
        self.inner.registry.heartbeat(msg);

        if let Some(task_ref) = task_ref {
            match self
                .inner
                .store
                .update_status(&task_ref.task_id, TaskStatus::Running, TaskPatch::default())
                .await
            {
                Ok(_) | Err(agentpool_store::StoreError::IllegalTransition { .. }) => {}
                Err(err) => warn!(%err, task_id = %task_ref.task_id, "failed to mark task running"),
            }
        }
    }

    /// spec §4.F step 3: `agent.status` transitioning to `idle` →
    /// `Registry.StatusChange`, then `ProcessQueue()`.
    pub(crate) async fn on_agent_status(&self, msg: AgentStatusChange) {
        let became_idle = msg.current_status == AgentStatus::Idle;
        self.inner.registry.status_change(msg);
        if became_idle {
            self.process_queue().await;
        }
    }

    /// spec §4.F step 4: `agent.toolcall` → forwarded via `onToolCall`,
    /// fire-and-forget, no state change.
    pub(crate) async fn on_agent_toolcall(&self, msg: agentpool_shared::messages::ToolCall) {
        let callbacks = self.inner.callbacks.read().await;
        if let Some(cb) = &callbacks.on_tool_call {
            cb(msg);
        }
    }

    pub(crate) async fn on_agent_deregister(&self, msg: AgentDeregister) {
        if let Some(info) = self.inner.registry.deregister(&msg.agent_id) {
            info!(agent_id = %msg.agent_id, "agent deregistered");
            if let Some(task_id) = info.current_task_id {
                self.fail_owned_task(&task_id, &msg.agent_id, "agent deregistered while owning a task")
                    .await;
            }
        }
    }

    /// spec §4.F step 5: `task.result` → verify, then complete/retry/escalate.
    pub(crate) async fn on_task_result(&self, result: TaskResult) {
        let task_id = result.task_id.clone();

        if let Err(err) = self
            .inner
            .store
            .update_status(&task_id, TaskStatus::Verifying, TaskPatch::default())
            .await
        {
            error!(%err, %task_id, "failed to mark task verifying");
            return;
        }

        let task = match self.inner.store.get(&task_id).await {
            Ok(task) => task,
            Err(err) => {
                error!(%err, %task_id, "task vanished mid-verification");
                return;
            }
        };

        let request = VerifyRequestBuilder::new(
            task_id.clone(),
            task
                .payload
                .worktree_path
                .clone()
                .map(std::path::PathBuf::from)
                .unwrap_or_default(),
            result.claims.clone(),
        )
        .config(self.inner.verify_config.clone())
        .build();

        let verification = match agentpool_verify::verify(&request).await {
            Ok(verification) => verification,
            Err(err) => {
                error!(%err, %task_id, "verification engine failed to run");
                return;
            }
        };

        if verification.success {
            self.complete_task(&task, result).await;
        } else {
            let failing = verification.failing_check_names();
            let message = result
                .error
                .as_ref()
                .map(|e| e.message.clone())
                .unwrap_or_else(|| format!("verification failed: {}", failing.join(", ")));
            self.fail_and_recover(&task, &result.agent_id, message, failing).await;
        }
    }

    async fn complete_task(&self, task: &Task, result: TaskResult) {
        let now = Utc::now();
        match self
            .inner
            .store
            .update_status(
                &task.task_id,
                TaskStatus::Completed,
                TaskPatch {
                    completed_at: Some(now),
                    result: Some(result),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(updated) => {
                self.inner.recovery.forget(&task.task_id);
                self.inner.completed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                info!(task_id = %task.task_id, "task completed");
                let callbacks = self.inner.callbacks.read().await;
                if let Some(cb) = &callbacks.on_task_complete {
                    cb(updated);
                }
            }
            Err(err) => error!(%err, task_id = %task.task_id, "failed to persist completion"),
        }
    }

    /// spec §4.F step 5 failure path and §4.F liveness sweep: mark failed,
    /// hand to the Recovery Manager, then either redispatch or escalate.
    pub(crate) async fn fail_and_recover(
        &self,
        task: &Task,
        agent_id: &AgentId,
        error_message: String,
        failing_checks: Vec<String>,
    ) {
        let now = Utc::now();
        let failed = match self
            .inner
            .store
            .update_status(
                &task.task_id,
                TaskStatus::Failed,
                TaskPatch {
                    result: Some(TaskResult {
                        task_id: task.task_id.clone(),
                        agent_id: agent_id.clone(),
                        success: false,
                        claims: Default::default(),
                        summary: error_message.clone(),
                        error: Some(TaskResultError {
                            message: error_message.clone(),
                            recoverable: true,
                        }),
                        start_time: now,
                        end_time: now,
                        duration_ms: 0,
                    }),
                    ..Default::default()
                },
            )
            .await
        {
            Ok(task) => task,
            Err(err) => {
                error!(%err, task_id = %task.task_id, "failed to persist failure");
                return;
            }
        };

        self.inner.failed.fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        let outcome = self.inner.recovery.handle_failure(
            &failed.task_id,
            &failed.payload.prompt,
            &agent_id.0,
            &error_message,
            &failing_checks,
        );

        {
            let callbacks = self.inner.callbacks.read().await;
            if let Some(cb) = &callbacks.on_task_failed {
                cb(failed.clone());
            }
        }

        if outcome.retry {
            if let Some(ctx) = outcome.recovery_context {
                self.inner
                    .pending_recovery
                    .insert(failed.task_id.clone(), ctx);
            }
            self.requeue_for_retry(&failed.task_id).await;
        } else if let Some(escalation) = outcome.escalation {
            warn!(task_id = %failed.task_id, "escalating task after retry budget exhausted");
            let callbacks = self.inner.callbacks.read().await;
            if let Some(cb) = &callbacks.on_escalation {
                cb(escalation);
            }
        }
    }

    async fn requeue_for_retry(&self, task_id: &TaskId) {
        if let Some(agent) = self.inner.registry.find_idle() {
            self.dispatch_task(agent.agent_id, task_id.clone()).await;
            return;
        }

        let score = match self.inner.store.get(task_id).await {
            Ok(task) => task.priority.score(),
            Err(err) => {
                error!(%err, %task_id, "failed to read task before requeue");
                return;
            }
        };

        if let Err(err) = self.inner.queue.enqueue(task_id, score).await {
            error!(%err, %task_id, "failed to requeue task for retry");
        }
    }

    /// spec §4.F `ProcessQueue`: drain the durable queue onto idle agents.
    pub(crate) async fn process_queue(&self) {
        loop {
            let Some(agent) = self.inner.registry.find_idle() else {
                break;
            };
            let dequeued = match self.inner.queue.dequeue().await {
                Ok(entry) => entry,
                Err(err) => {
                    error!(%err, "failed to dequeue task");
                    break;
                }
            };
            let Some(task_id) = dequeued else {
                break;
            };
            self.dispatch_task(agent.agent_id, task_id).await;
        }
    }

    /// spec §4.F `Dispatch`: hand one task to one agent, attaching recovery
    /// context if this is a retry.
    pub(crate) async fn dispatch_task(&self, agent_id: AgentId, task_id: TaskId) {
        let task = match self.inner.store.get(&task_id).await {
            Ok(task) => task,
            Err(err) => {
                error!(%err, %task_id, "task vanished before dispatch");
                return;
            }
        };

        let is_retry = task.attempts > 0 || task.status == TaskStatus::Failed;
        let attempts = if is_retry {
            match self.inner.store.increment_attempts(&task_id).await {
                Ok(n) => n,
                Err(err) => {
                    error!(%err, %task_id, "failed to increment attempts");
                    return;
                }
            }
        } else {
            task.attempts
        };

        let now = Utc::now();
        if let Err(err) = self
            .inner
            .store
            .update_status(
                &task_id,
                TaskStatus::Dispatched,
                TaskPatch {
                    assigned_agent_id: Some(agent_id.0.clone()),
                    dispatched_at: Some(now),
                    ..Default::default()
                },
            )
            .await
        {
            error!(%err, %task_id, "failed to mark task dispatched");
            return;
        }

        self.inner.registry.mark_dispatched(&agent_id, task_id.clone());

        let context = self
            .inner
            .pending_recovery
            .remove(&task_id)
            .map(|(_, ctx): (TaskId, RecoveryContext)| TaskDispatchContext {
                previous_attempts: ctx.attempt_number.saturating_sub(1),
                recovery_hints: ctx.failure_patterns,
                memory_context: Some(ctx.previous_failures.join("; ")),
            });

        let dispatch = TaskDispatch {
            task_id: task_id.clone(),
            target_agent_id: agent_id.clone(),
            task: TaskDispatchTask {
                description: task.payload.prompt.clone(),
                codebase_id: task.payload.codebase_id.clone(),
                worktree_path: task.payload.worktree_path.clone(),
                priority: task.priority,
                context,
            },
            conversation_id: None,
            platform: None,
            timestamp: now,
        };

        let dispatch_channel = channels::task_dispatch_for(&agent_id.0);
        if let Err(err) = self.inner.bus.publish(&dispatch_channel, &dispatch).await {
            error!(%err, %task_id, %agent_id, "failed to publish dispatch");
        } else {
            info!(%task_id, %agent_id, attempts, "task dispatched");
        }
    }

    /// Fails a task whose owning agent is known to be gone (deregistered or
    /// missed the liveness sweep).
    pub(crate) async fn fail_owned_task(&self, task_id: &TaskId, agent_id: &AgentId, reason: &str) {
        let task = match self.inner.store.get(task_id).await {
            Ok(task) => task,
            Err(_) => return,
        };
        if task.status.is_terminal() {
            return;
        }
        self.fail_and_recover(&task, agent_id, reason.to_string(), vec![]).await;
    }

    /// spec §4.F liveness sweep: reads the registry and fails any task whose
    /// owner has stopped heartbeating, then separately enforces the overall
    /// per-task timeout (spec §5) on whatever is left dispatched/running.
    pub(crate) async fn run_liveness_sweep(&self) {
        let dead = self
            .inner
            .registry
            .sweep(Utc::now(), self.inner.config.heartbeat_timeout_ms as i64);

        for agent in dead {
            warn!(agent_id = %agent.agent_id, "agent failed liveness sweep");
            if let Some(task_id) = agent.current_task_id.clone() {
                self.fail_owned_task(&task_id, &agent.agent_id, "agent missed heartbeat deadline")
                    .await;
            }
            let callbacks = self.inner.callbacks.read().await;
            if let Some(cb) = &callbacks.on_agent_dead {
                cb(agent.agent_id);
            }
        }

        self.sweep_timed_out_tasks().await;
    }

    /// spec §5: a task still `dispatched`/`running` past `task_timeout_ms`
    /// from `dispatched_at` is treated as a dead-agent failure even if its
    /// agent keeps heartbeating — it's the task, not the agent, that's stuck.
    async fn sweep_timed_out_tasks(&self) {
        let active = match self.inner.store.list_active().await {
            Ok(active) => active,
            Err(err) => {
                error!(%err, "failed to list active tasks during liveness sweep");
                return;
            }
        };

        let deadline = Utc::now() - self.inner.config.task_timeout();

        for task in active {
            if !matches!(task.status, TaskStatus::Dispatched | TaskStatus::Running) {
                continue;
            }
            let Some(dispatched_at) = task.dispatched_at else {
                continue;
            };
            if dispatched_at > deadline {
                continue;
            }

            let Some(agent_id) = task.assigned_agent_id.clone() else {
                continue;
            };

            warn!(task_id = %task.task_id, %agent_id, "task exceeded overall task timeout");
            self.fail_and_recover(&task, &agent_id, "task exceeded overall task timeout".to_string(), vec![])
                .await;
        }
    }

    /// Best-effort stop: publishes `control.stop.<agentId>` if the task is
    /// currently owned by an agent (spec §4.F `StopTask`).
    pub(crate) async fn publish_stop(&self, task_id: &TaskId, agent_id: &AgentId, reason: &str) -> bool {
        let msg = Stop {
            agent_id: agent_id.clone(),
            task_id: task_id.clone(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        };
        match self
            .inner
            .bus
            .publish(&channels::control_stop_for(&agent_id.0), &msg)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                error!(%err, %task_id, %agent_id, "failed to publish stop");
                false
            }
        }
    }

    /// spec §4.F `Stop()`: sends `Kill` to every known agent.
    pub(crate) async fn kill_all_agents(&self) {
        for agent in self.inner.registry.snapshot() {
            let msg = Kill {
                agent_id: agent.agent_id.clone(),
                reason: "coordinator shutting down".to_string(),
                timestamp: Utc::now(),
            };
            if let Err(err) = self
                .inner
                .bus
                .publish(&channels::control_kill_for(&agent.agent_id.0), &msg)
                .await
            {
                warn!(%err, agent_id = %agent.agent_id, "failed to publish kill on shutdown");
            }
        }
    }
}
