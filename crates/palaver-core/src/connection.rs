//! Per-contact connection: lifecycle state, history, and pending-send queue.
//!
//! # State Machine
//!
//! ```text
//!            open()             opened
//!   idle ───────────▶ connecting ───────▶ open
//!                         ▲                 │
//!                         │ reconnect       │ closed
//!                         │ (fixed delay)   ▼
//!                         └────────────── closed ◀── error (closed follows)
//! ```
//!
//! History and the pending queue survive reconnects. The transport handle is
//! replaced on every connect attempt; only one is ever live.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{mpsc::UnboundedSender, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::model::{ConnectionState, Message};
use crate::transport::{EventSink, HandleId, Transport, TransportEvent, TransportHandle};

/// Identifies one Connection instance.
///
/// A contact removed and re-added gets a new id, so a reconnect timer armed
/// for the old instance can never act on the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Work posted to the session manager from transport tasks and timers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSignal {
    /// An event reported by a transport handle.
    Transport {
        url: String,
        handle: HandleId,
        event: TransportEvent,
    },

    /// A reconnect delay elapsed for the given Connection instance.
    ReconnectDue { url: String, connection: ConnectionId },
}

/// Result of [`Connection::try_send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open transport.
    Sent,
    /// Held in the pending queue until the next successful open.
    Queued,
}

/// The live (or reconnecting) session with one contact.
pub struct Connection {
    id: ConnectionId,
    url: String,
    state: watch::Sender<ConnectionState>,
    messages: Vec<Message>,
    pending: VecDeque<String>,
    handle: Option<Box<dyn TransportHandle>>,
    handle_id: Option<HandleId>,
    reconnect: Option<JoinHandle<()>>,
}

impl Connection {
    /// Create an idle connection seeded with previously stored history.
    pub fn new(url: impl Into<String>, history: Vec<Message>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            id: ConnectionId::new(),
            url: url.into(),
            state,
            messages: history,
            pending: VecDeque::new(),
            handle: None,
            handle_id: None,
            reconnect: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe lifecycle changes. The receiver errors once the connection is dropped.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Texts accepted but not yet transmitted, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Id of the live transport handle, if a connect attempt has started.
    pub fn handle_id(&self) -> Option<HandleId> {
        self.handle_id
    }

    /// Whether `handle` is the connection's live handle.
    pub fn is_current(&self, handle: HandleId) -> bool {
        self.handle_id == Some(handle)
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Move to `state`. Returns false when the state was already `state`.
    pub fn set_state(&mut self, state: ConnectionState) -> bool {
        let previous = self.state.send_replace(state);
        if previous != state {
            log::debug!("Connection '{}': {} -> {}", self.url, previous, state);
        }
        previous != state
    }

    /// Start a new connect attempt, superseding any previous handle.
    pub fn open(&mut self, transport: &dyn Transport, sink: EventSink) {
        self.cancel_reconnect();
        // Dropping the old handle ends its task; its late events carry a stale id
        self.handle = None;

        self.handle_id = Some(sink.handle());
        self.set_state(ConnectionState::Connecting);
        self.handle = Some(transport.open(&self.url, sink));
    }

    /// Transmit now if open, otherwise (or on failure) queue for the next open.
    pub fn try_send(&mut self, text: &str) -> SendOutcome {
        if self.state() == ConnectionState::Open {
            if let Some(handle) = &self.handle {
                match handle.send(text) {
                    Ok(()) => return SendOutcome::Sent,
                    Err(e) => log::warn!("Send to '{}' failed, queueing: {}", self.url, e),
                }
            }
        }
        self.pending.push_back(text.to_string());
        SendOutcome::Queued
    }

    /// Transmit every queued text once, oldest first, and clear the queue.
    ///
    /// Failures are logged and dropped, not re-queued. Returns how many
    /// transmissions succeeded.
    pub fn flush_pending(&mut self) -> usize {
        let queued: Vec<String> = self.pending.drain(..).collect();
        let Some(handle) = &self.handle else {
            log::warn!("Dropping {} queued messages for '{}': no handle", queued.len(), self.url);
            return 0;
        };

        let mut sent = 0;
        for text in &queued {
            match handle.send(text) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Queued send to '{}' failed: {}", self.url, e),
            }
        }
        sent
    }

    /// Append to the history. Insertion order is display order.
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Arm the fixed-delay reconnect timer, replacing any armed one.
    ///
    /// When it fires, a [`ConnectionSignal::ReconnectDue`] naming this
    /// instance is posted to `signals`.
    pub fn schedule_reconnect(&mut self, delay: Duration, signals: UnboundedSender<ConnectionSignal>) {
        self.cancel_reconnect();
        let signal = ConnectionSignal::ReconnectDue {
            url: self.url.clone(),
            connection: self.id,
        };
        self.reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = signals.send(signal);
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }

    /// Tear down: cancel any reconnect and close the handle if it is live.
    ///
    /// The lifecycle state is left as-is; nothing about this instance changes
    /// after shutdown.
    pub fn shutdown(&mut self, code: u16, reason: &str) {
        self.cancel_reconnect();
        if let Some(handle) = self.handle.take() {
            if self.state().is_active() {
                handle.close(code, reason);
            }
        }
        self.handle_id = None;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel_reconnect();
    }
}
