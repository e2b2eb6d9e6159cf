//! Gateway registry.
//!
//! The lifecycle resolves gateways by id through this registry. Embedders
//! register their own processors next to the reference ones.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::domain::foundation::GatewayId;
use crate::ports::Gateway;

use super::{FreeGateway, ManualGateway, SandboxCardGateway};

/// Gateways keyed by id.
#[derive(Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<GatewayId, Arc<dyn Gateway>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the reference gateways with settings from configuration.
    ///
    /// All three are registered even when unconfigured, so a purchase
    /// through one fails with a configuration error rather than "unknown
    /// gateway".
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new()
            .with(Arc::new(FreeGateway::new()))
            .with(Arc::new(ManualGateway::new(config.manual_instructions.clone())))
            .with(Arc::new(SandboxCardGateway::new(config.card_api_key.clone())))
    }

    /// Adds or replaces the gateway with the same id.
    pub fn register(&mut self, gateway: Arc<dyn Gateway>) {
        self.gateways.insert(gateway.id(), gateway);
    }

    pub fn with(mut self, gateway: Arc<dyn Gateway>) -> Self {
        self.register(gateway);
        self
    }

    pub fn get(&self, id: &GatewayId) -> Option<Arc<dyn Gateway>> {
        self.gateways.get(id).cloned()
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<GatewayId> {
        let mut ids: Vec<_> = self.gateways.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn configured(&self) -> Vec<GatewayId> {
        let mut ids: Vec<_> = self
            .gateways
            .values()
            .filter(|g| g.is_configured())
            .map(|g| g.id())
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for GatewayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayRegistry")
            .field("gateways", &self.ids())
            .finish()
    }
}
