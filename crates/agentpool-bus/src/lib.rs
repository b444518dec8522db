//! # agentpool-bus
//!
//! Typed publish/subscribe over a PostgreSQL backend (`LISTEN/NOTIFY`) plus
//! a durable, score-ordered priority queue of task identifiers (spec §4.A).
//!
//! Notifications carry only a compact event record (well under the 8 KB
//! `NOTIFY` payload limit); the full row lives in the Task Store / Agent
//! Registry and is re-read by the subscriber when needed, following
//! `tasker-shared::messaging`'s provider design.

mod error;
mod pubsub;
mod queue;

pub use error::BusError;
pub use pubsub::{Envelope, Handler, MessageBus};
pub use queue::DurableQueue;
