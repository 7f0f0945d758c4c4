//! Shared error and event types.

pub mod errors;
pub mod events;

pub use errors::{DeliveryError, DeliveryResult, PublishError, PushError};
pub use events::ServerEvent;
