//! datachat Protocol
//!
//! Shared types for communication between the datachat backend and clients.
//! Query frames travel as JSON over WebSocket; history and feedback use JSON
//! over HTTP.

use uuid::Uuid;

pub mod client;
pub mod server;
pub mod types;

pub use client::*;
pub use server::*;
pub use types::*;

/// Generate a new unique session ID
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
