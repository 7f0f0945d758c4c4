//! Delivery services.

pub mod authorization;
pub mod delivery_service;
pub mod events;
pub mod presence;
pub mod pusher;

pub use authorization::AuthorizationGate;
pub use delivery_service::{DeliveryService, DeliverySettings};
pub use events::{DisabledPublisher, EventPublisher, MessageEvent, RedisStreamPublisher};
pub use presence::{ConnectionHandle, ConnectionRegistry, PresenceDirectory};
pub use pusher::{ChannelPusher, Pusher};
