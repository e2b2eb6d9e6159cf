//! Event publisher adapters.
//!
//! - `InMemoryEventBus` - Captures events for assertions and embedding
//! - `TracingEventPublisher` - Writes events to the `tracing` log

mod in_memory;
mod tracing_publisher;

pub use in_memory::InMemoryEventBus;
pub use tracing_publisher::TracingEventPublisher;
