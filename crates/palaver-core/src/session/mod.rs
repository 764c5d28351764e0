//! Session management: every contact, its connection, and the selection.
//!
//! One [`SessionManager`] serves one view layer. It is a plain owned value;
//! transport tasks and timers never touch it directly and instead post
//! signals that the owner drains with `process_next` / `process_pending`.

mod manager;

pub use manager::SessionManager;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The address is not a `wss://` (or, when allowed, `ws://`) URL with a host.
    #[error("Invalid contact address: {0}")]
    InvalidAddress(String),
}
