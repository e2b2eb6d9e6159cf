//! Payment gateway adapters.
//!
//! - `FreeGateway` - Settles zero-total invoices without a processor
//! - `ManualGateway` - Offline payment, settled later by confirmation
//! - `SandboxCardGateway` - Token-driven card processor for development
//! - `MockGateway` - Scriptable gateway for tests
//! - `GatewayRegistry` - Lookup by gateway id
//! - `ConfirmationVerifier` - HMAC check for out-of-band confirmations

mod confirmation_verifier;
mod free;
mod manual;
mod mock;
mod registry;
mod sandbox_card;

pub use confirmation_verifier::{
    ConfirmationError, ConfirmationVerifier, SignedConfirmation, VerifiedConfirmation,
};
pub use free::{FreeGateway, FREE_GATEWAY_ID};
pub use manual::{ManualGateway, MANUAL_GATEWAY_ID};
pub use mock::{ChargeGate, MockGateway};
pub use registry::GatewayRegistry;
pub use sandbox_card::{SandboxCardGateway, CARD_GATEWAY_ID};
