//! datachat client core
//!
//! Maintains one persistent WebSocket connection to the datachat backend,
//! interprets the incremental status-to-final-answer streaming protocol, and
//! keeps the in-memory session store consistent under concurrent and failing
//! network conditions. UIs (the CLI crate, or anything else) subscribe to
//! [`events::ClientEvent`] and read snapshots through [`ChatClient`].

pub mod auth;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod history;
pub mod locale;
pub mod prefs;
pub mod reducer;
pub mod store;
pub mod transport;

pub use client::ChatClient;
pub use config::{ClientConfig, QueryConfig};
pub use error::ClientError;
pub use events::{ClientEvent, ToastLevel};
