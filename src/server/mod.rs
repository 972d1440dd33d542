//! Matchmaking server module.
//!
//! Provides the HTTP matchmaking API and the WebSocket relay.

pub mod api;
pub mod relay;
mod server;

pub use server::{run, ServerConfig};
