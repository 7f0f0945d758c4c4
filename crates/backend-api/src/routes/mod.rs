pub mod auth;
pub mod health;
pub mod messages;
pub mod users;
pub mod websocket;
