//! # agentpool-coordinator
//!
//! Wires the Agent Registry, Task Store, Coordination Bus, Verification
//! Engine and Recovery Manager into one running scheduler (spec §4.F). This
//! is the only crate in the workspace that depends on all four others; it
//! owns no state of its own beyond the glue (pending recovery context and
//! terminal-count counters), following how
//! `examples/tasker-systems-tasker-core`'s `tasker-orchestration` crate sits
//! on top of its component crates without duplicating their state.

mod callbacks;
mod dispatch;
mod error;
mod snapshot;

pub use callbacks::Callbacks;
pub use error::CoordinatorError;
pub use snapshot::{PoolSnapshot, TaskCounts};

use agentpool_bus::{DurableQueue, Envelope, MessageBus};
use agentpool_recovery::RecoveryManager;
use agentpool_registry::AgentRegistry;
use agentpool_shared::config::AgentPoolConfig;
use agentpool_shared::messages::channels;
use agentpool_shared::types::{
    Priority, RecoveryContext, Task, TaskId, TaskPayload, TaskStatus,
};
use agentpool_store::TaskStore;
use agentpool_verify::VerifyConfig;
use dashmap::DashMap;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

const LIVENESS_SWEEP_INTERVAL: Duration = Duration::from_secs(5);

struct Inner {
    bus: MessageBus,
    queue: DurableQueue,
    registry: AgentRegistry,
    store: TaskStore,
    recovery: RecoveryManager,
    pending_recovery: DashMap<TaskId, RecoveryContext>,
    callbacks: RwLock<Callbacks>,
    config: AgentPoolConfig,
    verify_config: VerifyConfig,
    completed: AtomicU64,
    failed: AtomicU64,
    sweep_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// Handle to a running coordinator. Cloning is cheap (`Arc` internally) and
/// every clone observes the same underlying state, matching how the
/// teacher's orchestration bootstrap hands out a shareable handle rather
/// than a unique owner.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Connects to Postgres, runs the bus/queue/store migrations, and
    /// returns a coordinator that is not yet dispatching (spec §4.F
    /// `Bootstrap`). Call [`Coordinator::start`] to begin processing.
    pub async fn bootstrap(config: AgentPoolConfig) -> Result<Self, CoordinatorError> {
        let database_url = config
            .database_url
            .clone()
            .ok_or_else(|| CoordinatorError::Config("DATABASE_URL is not set".to_string()))?;

        let pool = PgPool::connect(&database_url).await?;
        let op_timeout = config.backend_op_timeout();

        let bus = MessageBus::new(pool.clone(), op_timeout);
        let queue = DurableQueue::new(pool.clone(), op_timeout);
        let store = TaskStore::new(pool, op_timeout);

        queue.migrate().await?;
        store.migrate().await?;

        let verify_config = VerifyConfig {
            run_tests: config.verify_test_enabled,
            run_type_check: config.verify_typecheck_enabled,
            check_timeout: config.verify_check_timeout(),
            total_timeout: config.verify_total_timeout(),
            test_command: None,
            type_check_command: None,
        };

        let coordinator = Self {
            inner: Arc::new(Inner {
                bus,
                queue,
                registry: AgentRegistry::new(),
                store,
                recovery: RecoveryManager::new(config.max_attempts),
                pending_recovery: DashMap::new(),
                callbacks: RwLock::new(Callbacks::new()),
                verify_config,
                completed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                sweep_task: std::sync::Mutex::new(None),
                config,
            }),
        };

        Ok(coordinator)
    }

    /// Replaces the caller-registered callbacks (spec §4.F `SetHandlers`).
    pub async fn set_handlers(&self, callbacks: Callbacks) {
        *self.inner.callbacks.write().await = callbacks;
    }

    /// Subscribes to every inbound channel and starts the liveness-sweep
    /// ticker (spec §4.F `Start`). Idempotent only in the sense that
    /// duplicate subscriptions accumulate duplicate handlers — call once.
    pub fn start(&self) {
        self.subscribe_inbound();

        let coordinator = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LIVENESS_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                coordinator.run_liveness_sweep().await;
            }
        });
        *self.inner.sweep_task.lock().unwrap_or_else(|p| p.into_inner()) = Some(handle);

        info!("coordinator started");
    }

    fn subscribe_inbound(&self) {
        subscribe_decoded(&self.inner.bus, channels::AGENT_REGISTER, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_agent_register(msg).await });
            }
        });
        subscribe_decoded(&self.inner.bus, channels::AGENT_HEARTBEAT, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_agent_heartbeat(msg).await });
            }
        });
        subscribe_decoded(&self.inner.bus, channels::AGENT_STATUS, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_agent_status(msg).await });
            }
        });
        subscribe_decoded(&self.inner.bus, channels::AGENT_TOOLCALL, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_agent_toolcall(msg).await });
            }
        });
        subscribe_decoded(&self.inner.bus, channels::AGENT_DEREGISTER, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_agent_deregister(msg).await });
            }
        });
        subscribe_decoded(&self.inner.bus, channels::TASK_RESULT, {
            let c = self.clone();
            move |msg| {
                let c = c.clone();
                tokio::spawn(async move { c.on_task_result(msg).await });
            }
        });
    }

    /// spec §4.F `SubmitTask`: persists the task, enqueues it, and
    /// immediately tries to dispatch it to an idle agent.
    pub async fn submit_task(
        &self,
        task_id: Option<TaskId>,
        priority: Priority,
        payload: TaskPayload,
    ) -> Result<TaskId, CoordinatorError> {
        let task_id = task_id.unwrap_or_else(TaskId::generate);
        let task = Task::new(task_id.clone(), priority, payload);

        self.inner.store.create(&task).await?;
        self.inner.queue.enqueue(&task_id, priority.score()).await?;
        self.process_queue().await;

        Ok(task_id)
    }

    /// spec §4.F `StopTask`: best-effort. A still-queued task is cancelled
    /// outright, since nothing owns it yet. A task already handed to an
    /// agent only gets a `control.stop` signal — its status stays whatever
    /// the agent last reported until that agent publishes a result or misses
    /// the liveness deadline (spec §8 scenario S6). Never blocks on the
    /// agent actually stopping.
    pub async fn stop_task(&self, task_id: &TaskId) -> Result<(), CoordinatorError> {
        let task = self.inner.store.get(task_id).await?;

        if task.status.is_terminal() {
            return Ok(());
        }

        self.inner.queue.remove(task_id).await?;

        if let Some(agent_id) = task.assigned_agent_id.clone() {
            self.publish_stop(task_id, &agent_id, "stop requested").await;
            return Ok(());
        }

        self.inner
            .store
            .update_status(task_id, TaskStatus::Cancelled, Default::default())
            .await?;

        Ok(())
    }

    /// spec §4.F `PoolSnapshot`: read-only view of agents and task counts.
    pub async fn pool_snapshot(&self) -> Result<PoolSnapshot, CoordinatorError> {
        let agents = self.inner.registry.snapshot();
        let queued = self.inner.queue.len().await?.max(0) as u64;
        let active = self.inner.store.list_active().await?;
        let running = active
            .iter()
            .filter(|t| matches!(t.status, TaskStatus::Dispatched | TaskStatus::Running | TaskStatus::Verifying))
            .count() as u64;

        Ok(PoolSnapshot {
            agents,
            tasks: TaskCounts {
                queued,
                running,
                completed: self.inner.completed.load(Ordering::Relaxed),
                failed: self.inner.failed.load(Ordering::Relaxed),
            },
        })
    }

    /// spec §4.F `Stop`: signals every known agent to stop, then stops the
    /// liveness sweep. Does not wait for agents to acknowledge — callers
    /// needing a hard deadline should wrap this in `tokio::time::timeout`.
    pub async fn stop(&self) {
        self.kill_all_agents().await;

        if let Some(handle) = self
            .inner
            .sweep_task
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
        {
            handle.abort();
        }

        info!("coordinator stopped");
    }
}

/// Bridges the bus's untyped [`Envelope`] handlers to a typed callback,
/// dropping envelopes that don't decode as `T` (malformed or from a
/// mismatched producer) with a logged warning rather than panicking.
fn subscribe_decoded<T, F>(bus: &MessageBus, channel: &str, f: F)
where
    T: serde::de::DeserializeOwned + Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let channel_owned = channel.to_string();
    bus.subscribe(
        channel,
        Arc::new(move |envelope: Envelope| match envelope.decode::<T>() {
            Ok(msg) => f(msg),
            Err(err) => {
                tracing::warn!(channel = %channel_owned, error = %err, "failed to decode message")
            }
        }),
    );
}
