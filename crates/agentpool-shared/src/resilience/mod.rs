//! Circuit breaker primitives protecting the bus and store boundaries from
//! cascading retries against an unreachable backend (spec §7, "transient
//! backend error").
//!
//! The design mirrors the teacher's `resilience::behavior` split: a small
//! object-safe trait (`CircuitBreakerBehavior`) plus one concrete
//! implementation (`CircuitBreaker`) that consumers hold directly in the hot
//! path and only reach for `&dyn CircuitBreakerBehavior` when uniform access
//! is needed (e.g. a future health-report endpoint).

mod breaker;
mod behavior;

pub use behavior::CircuitBreakerBehavior;
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
