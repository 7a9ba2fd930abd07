//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Typed reconciliation events with fixed severities
//! - Phase tracing through `ObservationScope`
//!
//! Observability is read-only: nothing here feeds back into reconciliation
//! decisions.
//!
//! ```ignore
//! use shardkeeper::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! let scope = ObservationScope::new("SHARDS");
//! log_event_with_fields(Event::ShardAdded, &[("shard", "rs_a/h1:27017")]);
//! scope.complete(&[]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log an event with additional fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}
