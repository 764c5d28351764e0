//! # palaver-core
//!
//! Core session logic for Palaver, a per-contact WebSocket chat client.
//!
//! This crate is framework-agnostic and can be driven by:
//! - the terminal front end (`palaver-cli`)
//! - any other view layer that can own a `SessionManager` and pump its signals
//!
//! ## Key Concepts
//!
//! - **Contact**: A remote peer reachable at a `wss://` address
//! - **Connection**: The reconnecting transport session and message history for one contact
//! - **SessionManager**: Owns every Connection and exposes the state observers render

pub mod config;
pub mod connection;
pub mod event_bus;
pub mod logging;
pub mod model;
pub mod paths;
pub mod persistence;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::SessionConfig;
pub use event_bus::{EventBus, SessionEvent};
pub use model::{ConnectionState, Contact, ContactPatch, Direction, Message};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, Persistence, StoreError};
pub use session::{SessionError, SessionManager};
pub use transport::{Transport, TransportError, TransportHandle, WsTransport};
