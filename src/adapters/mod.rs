//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event publishers (in-memory capture, tracing log)
//! - `gateway` - Payment gateways and their registry
//! - `memory` - In-memory storage

pub mod events;
pub mod gateway;
pub mod memory;

pub use events::{InMemoryEventBus, TracingEventPublisher};
pub use gateway::{GatewayRegistry, MockGateway};
pub use memory::{
    InMemoryInvoiceRepository, InMemoryMemberRepository, InMemoryMembershipRepository,
    InMemorySubscriptionRepository,
};
