use crate::error::BusError;
use agentpool_shared::resilience::{CircuitBreaker, CircuitBreakerBehavior, CircuitBreakerConfig};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, warn};

/// `NOTIFY` payloads are capped around 8 KB by the reference backend (spec
/// §4.A, §9); we stay well under that since envelopes carry identifiers, not
/// full rows.
const NOTIFY_PAYLOAD_SOFT_LIMIT: usize = 8 * 1024;

const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(200);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);

/// A received message, already deserialized to JSON. Typed `Subscribe`
/// callers decode the payload themselves via [`Envelope::decode`].
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub channel: String,
    pub payload: Value,
    pub published_at: DateTime<Utc>,
}

impl Envelope {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_value(self.payload.clone()).map_err(BusError::from)
    }
}

pub type Handler = Arc<dyn Fn(Envelope) + Send + Sync>;

enum ListenerCommand {
    AddChannel(String),
}

struct Shared {
    pool: PgPool,
    handlers: DashMap<String, Vec<Handler>>,
    listener_started: AtomicBool,
    listener_tx: Mutex<Option<mpsc::Sender<ListenerCommand>>>,
    circuit_breaker: CircuitBreaker,
    op_timeout: Duration,
}

/// Typed publish/subscribe channels plus connection management for
/// PostgreSQL `LISTEN/NOTIFY` (spec §4.A).
///
/// One dedicated `PgListener` connection is held by a background task for
/// the lifetime of the bus — "listen" state is connection-local, so a
/// single shared listener fans out to every subscribed channel rather than
/// opening one connection per `Subscribe` call.
#[derive(Clone)]
pub struct MessageBus {
    shared: Arc<Shared>,
}

impl MessageBus {
    pub fn new(pool: PgPool, op_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                pool,
                handlers: DashMap::new(),
                listener_started: AtomicBool::new(false),
                listener_tx: Mutex::new(None),
                circuit_breaker: CircuitBreaker::new("bus", CircuitBreakerConfig::default()),
                op_timeout,
            }),
        }
    }

    /// Publish `payload` on `channel`. Succeeds once the `NOTIFY` is
    /// accepted by the backend; fails with [`BusError::BusUnavailable`] if
    /// the circuit is open or the call times out (spec §4.A contract).
    #[instrument(skip(self, payload), fields(channel = %channel))]
    pub async fn publish<T: Serialize>(&self, channel: &str, payload: &T) -> Result<(), BusError> {
        if !self.shared.circuit_breaker.should_allow() {
            return Err(BusError::BusUnavailable(format!(
                "circuit open for channel {channel}"
            )));
        }

        let body = serde_json::to_string(payload)?;
        if body.len() > NOTIFY_PAYLOAD_SOFT_LIMIT {
            warn!(
                channel,
                bytes = body.len(),
                "notify payload exceeds soft limit; consider carrying only an id"
            );
        }

        let started = Instant::now();
        let pool = self.shared.pool.clone();
        let channel_owned = channel.to_string();
        let result = tokio::time::timeout(
            self.shared.op_timeout,
            sqlx::query("SELECT pg_notify($1, $2)")
                .bind(&channel_owned)
                .bind(&body)
                .execute(&pool),
        )
        .await;

        match result {
            Ok(Ok(_)) => {
                self.shared.circuit_breaker.record_success(started.elapsed());
                debug!(channel, "published");
                Ok(())
            }
            Ok(Err(err)) => {
                self.shared.circuit_breaker.record_failure(started.elapsed());
                error!(channel, error = %err, "publish failed");
                Err(BusError::from(err))
            }
            Err(_) => {
                self.shared.circuit_breaker.record_failure(started.elapsed());
                Err(BusError::Timeout(self.shared.op_timeout))
            }
        }
    }

    /// Register `handler` to be invoked on every subsequent message on
    /// `channel`. Handlers execute on the bus's own worker and may be
    /// invoked concurrently for distinct messages (spec §4.A).
    #[instrument(skip(self, handler), fields(channel = %channel))]
    pub fn subscribe(&self, channel: &str, handler: Handler) {
        self.ensure_listener_started();

        let is_new_channel = !self.shared.handlers.contains_key(channel);
        self.shared
            .handlers
            .entry(channel.to_string())
            .or_default()
            .push(handler);

        if is_new_channel {
            if let Some(tx) = self.shared.listener_tx.lock().unwrap_or_else(|p| p.into_inner()).clone() {
                let _ = tx.try_send(ListenerCommand::AddChannel(channel.to_string()));
            }
        }
    }

    /// Terminate a prior subscription. In-flight handler invocations may
    /// still complete (spec §4.A) since we only clear the registry, not any
    /// task already spawned for a delivered message.
    pub fn unsubscribe(&self, channel: &str) {
        self.shared.handlers.remove(channel);
    }

    fn ensure_listener_started(&self) {
        if self
            .shared
            .listener_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let (tx, rx) = mpsc::channel(128);
        *self.shared.listener_tx.lock().unwrap_or_else(|p| p.into_inner()) = Some(tx);

        let shared = self.shared.clone();
        tokio::spawn(async move {
            listener_loop(shared, rx).await;
        });
    }
}

/// Background task owning the single `PgListener` connection. Reconnects
/// with exponential backoff on connection loss; callers are responsible for
/// reconciling any notifications missed during the outage (spec §4.A
/// "Failure semantics" — the coordinator's liveness sweep covers this).
async fn listener_loop(shared: Arc<Shared>, mut commands: mpsc::Receiver<ListenerCommand>) {
    let mut channels: Vec<String> = shared
        .handlers
        .iter()
        .map(|entry| entry.key().clone())
        .collect();
    let mut backoff = RECONNECT_BASE_DELAY;

    loop {
        let listener = match PgListener::connect_with(&shared.pool).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(error = %err, delay_ms = backoff.as_millis() as u64, "listener connect failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(RECONNECT_MAX_DELAY);
                continue;
            }
        };
        backoff = RECONNECT_BASE_DELAY;

        let mut listener = listener;
        for channel in &channels {
            if let Err(err) = listener.listen(channel).await {
                error!(channel, error = %err, "failed to LISTEN on channel");
            }
        }

        loop {
            tokio::select! {
                notification = listener.try_recv() => {
                    match notification {
                        Ok(Some(notification)) => {
                            dispatch(&shared, notification.channel(), notification.payload());
                        }
                        Ok(None) => {
                            warn!("listener connection closed, reconnecting");
                            break;
                        }
                        Err(err) => {
                            error!(error = %err, "listener recv error, reconnecting");
                            break;
                        }
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(ListenerCommand::AddChannel(channel)) => {
                            if let Err(err) = listener.listen(&channel).await {
                                error!(channel, error = %err, "failed to LISTEN on new channel");
                            } else if !channels.contains(&channel) {
                                channels.push(channel);
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }
}

fn dispatch(shared: &Arc<Shared>, channel: &str, raw_payload: &str) {
    let Some(handlers) = shared.handlers.get(channel) else {
        return;
    };
    let payload: Value = match serde_json::from_str(raw_payload) {
        Ok(value) => value,
        Err(err) => {
            error!(channel, error = %err, "failed to decode notify payload");
            return;
        }
    };

    let envelope = Envelope {
        channel: channel.to_string(),
        payload,
        published_at: Utc::now(),
    };

    for handler in handlers.value().clone() {
        let envelope = envelope.clone();
        // Fire-and-forget: a slow handler must not block the listener loop
        // from draining further notifications (spec §5).
        tokio::spawn(async move {
            handler(envelope);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decodes_typed_payload() {
        let envelope = Envelope {
            channel: "agent.heartbeat".to_string(),
            payload: serde_json::json!({"agent_id": "a1"}),
            published_at: Utc::now(),
        };

        #[derive(serde::Deserialize)]
        struct Minimal {
            agent_id: String,
        }

        let decoded: Minimal = envelope.decode().expect("decodes");
        assert_eq!(decoded.agent_id, "a1");
    }
}
