//! Coordinator configuration, loaded from environment variables with the
//! documented defaults (spec §6). Uses the `config` crate's `Environment`
//! source the way `tasker-shared`'s config manager layers env overrides on
//! top of struct defaults.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// All environment variables are optional; defaults match spec §6.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPoolConfig {
    pub heartbeat_timeout_ms: u64,
    pub max_agents: usize,
    pub task_timeout_ms: u64,
    pub max_attempts: u32,
    pub verify_test_enabled: bool,
    pub verify_typecheck_enabled: bool,

    /// Per-operation timeout for bus/store calls (spec §5, default 5s).
    pub backend_op_timeout_ms: u64,
    /// Per-check verification subprocess timeout (spec §5, default 120s).
    pub verify_check_timeout_ms: u64,
    /// Overall per-verify wall-clock cap (spec §5, default 300s).
    pub verify_total_timeout_ms: u64,

    pub database_url: Option<String>,
}

impl Default for AgentPoolConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_ms: 15_000,
            max_agents: 12,
            task_timeout_ms: 600_000,
            max_attempts: 3,
            verify_test_enabled: false,
            verify_typecheck_enabled: false,
            backend_op_timeout_ms: 5_000,
            verify_check_timeout_ms: 120_000,
            verify_total_timeout_ms: 300_000,
            database_url: None,
        }
    }
}

impl AgentPoolConfig {
    /// Load configuration from process environment, falling back to defaults
    /// for anything unset. `.env` is loaded first (if present) so local
    /// development doesn't require exporting every variable by hand.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        let builder = config::Config::builder()
            .set_default("heartbeat_timeout_ms", defaults.heartbeat_timeout_ms)?
            .set_default("max_agents", defaults.max_agents as i64)?
            .set_default("task_timeout_ms", defaults.task_timeout_ms)?
            .set_default("max_attempts", defaults.max_attempts)?
            .set_default("verify_test_enabled", defaults.verify_test_enabled)?
            .set_default(
                "verify_typecheck_enabled",
                defaults.verify_typecheck_enabled,
            )?
            .set_default("backend_op_timeout_ms", defaults.backend_op_timeout_ms)?
            .set_default(
                "verify_check_timeout_ms",
                defaults.verify_check_timeout_ms,
            )?
            .set_default(
                "verify_total_timeout_ms",
                defaults.verify_total_timeout_ms,
            )?
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let raw = builder.build()?;
        let mut cfg: Self = raw.try_deserialize()?;

        // `config::Environment` doesn't know our ad-hoc, unprefixed variable
        // names (HEARTBEAT_TIMEOUT_MS etc.) without a custom mapping, so we
        // layer the exact spec §6 names on top explicitly.
        if let Ok(v) = std::env::var("HEARTBEAT_TIMEOUT_MS") {
            if let Ok(v) = v.parse() {
                cfg.heartbeat_timeout_ms = v;
            }
        }
        if let Ok(v) = std::env::var("MAX_AGENTS") {
            if let Ok(v) = v.parse() {
                cfg.max_agents = v;
            }
        }
        if let Ok(v) = std::env::var("TASK_TIMEOUT_MS") {
            if let Ok(v) = v.parse() {
                cfg.task_timeout_ms = v;
            }
        }
        if let Ok(v) = std::env::var("MAX_ATTEMPTS") {
            if let Ok(v) = v.parse() {
                cfg.max_attempts = v;
            }
        }
        if let Ok(v) = std::env::var("VERIFY_TEST_ENABLED") {
            cfg.verify_test_enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("VERIFY_TYPECHECK_ENABLED") {
            cfg.verify_typecheck_enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            cfg.database_url = Some(v);
        }

        Ok(cfg)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    pub fn backend_op_timeout(&self) -> Duration {
        Duration::from_millis(self.backend_op_timeout_ms)
    }

    pub fn verify_check_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_check_timeout_ms)
    }

    pub fn verify_total_timeout(&self) -> Duration {
        Duration::from_millis(self.verify_total_timeout_ms)
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
