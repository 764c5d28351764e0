//! Session event broadcasting.
//!
//! The EventBus is how view layers observe a [`SessionManager`](crate::SessionManager).
//! Every mutation is applied first and then announced, so a subscriber that
//! reacts to an event always reads the post-mutation state.
//!
//! # Example
//!
//! ```rust
//! use palaver_core::event_bus::{EventBus, SessionEvent};
//! use std::sync::Arc;
//!
//! let event_bus = Arc::new(EventBus::new());
//! let mut rx = event_bus.subscribe();
//!
//! event_bus.emit(SessionEvent::SelectionChanged { url: None });
//!
//! // In async context:
//! // let event = rx.recv().await.unwrap();
//! # let _ = rx.try_recv();
//! ```

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{ConnectionState, Contact, Message};

/// Default channel capacity for the event bus.
/// Events beyond this capacity will cause slow subscribers to miss events (lag).
const DEFAULT_CAPACITY: usize = 1024;

/// Something observers may need to re-render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SessionEvent {
    /// The contact collection changed; carries the full new list.
    ContactsChanged { contacts: Vec<Contact> },

    /// The selected contact changed.
    SelectionChanged { url: Option<String> },

    /// A message was appended to a conversation.
    MessageAppended { url: String, message: Message },

    /// A connection moved to a new lifecycle state.
    ConnectionStateChanged { url: String, state: ConnectionState },
}

impl SessionEvent {
    /// Contact address the event concerns, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::ContactsChanged { .. } => None,
            Self::SelectionChanged { url } => url.as_deref(),
            Self::MessageAppended { url, .. } | Self::ConnectionStateChanged { url, .. } => {
                Some(url)
            }
        }
    }
}

/// Broadcasts [`SessionEvent`]s to any number of subscribers.
///
/// Uses a tokio broadcast channel internally, allowing multiple consumers to
/// receive the same events concurrently.
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new EventBus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new EventBus with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, the event is dropped and 0 is returned.
    pub fn emit(&self, event: SessionEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to all future events. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Get the current number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
