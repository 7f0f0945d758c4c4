use std::sync::Arc;

use herald_auth::{AuthSession, Authenticator, User};
use herald_delivery::{ConnectionRegistry, DeliveryService};

use crate::ApiError;

/// Queue depth per websocket when none is configured.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    delivery: Arc<DeliveryService>,
    registry: ConnectionRegistry,
    outbound_buffer: usize,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        delivery: Arc<DeliveryService>,
        registry: ConnectionRegistry,
    ) -> Self {
        Self::with_outbound_buffer(authenticator, delivery, registry, DEFAULT_OUTBOUND_BUFFER)
    }

    pub fn with_outbound_buffer(
        authenticator: Authenticator,
        delivery: Arc<DeliveryService>,
        registry: ConnectionRegistry,
        outbound_buffer: usize,
    ) -> Self {
        Self {
            authenticator,
            delivery,
            registry,
            outbound_buffer: outbound_buffer.max(1),
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn delivery(&self) -> &DeliveryService {
        &self.delivery
    }

    /// Live connections. Must be the same registry the delivery service
    /// looks recipients up in.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn outbound_buffer(&self) -> usize {
        self.outbound_buffer
    }

    pub async fn authenticate(&self, token: &str) -> Result<(User, AuthSession), ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }
}
