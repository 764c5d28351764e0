//! Transport port: duplex, text-framed connections to a contact address.
//!
//! A [`Transport`] opens handles. Each handle reports what happens to it by
//! posting events through the [`EventSink`] it was opened with; the session
//! manager drains those events on its own schedule. Nothing a transport does
//! ever calls back into session state directly.

mod ws;

pub use ws::WsTransport;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::connection::ConnectionSignal;

/// Close code reported when a connection drops without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Error type for transmissions on a handle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The handle has not finished its handshake, or has already closed.
    #[error("Transport is not open")]
    NotOpen,

    /// The underlying connection rejected the frame.
    #[error("Send failed: {0}")]
    Send(String),
}

/// Identifies one handle across the lifetime of a session.
///
/// Every connect attempt gets a new id, so events from a superseded handle can
/// be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(pub u64);

impl std::fmt::Display for HandleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something a handle reports about itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed; `send` will now transmit.
    Opened,
    /// A text frame arrived from the peer.
    Message(String),
    /// The connection is gone, gracefully or not.
    Closed { code: u16, reason: String },
    /// A transport-level failure. A `Closed` follows.
    Errored(String),
}

/// Per-handle event callback, backed by the session manager's signal queue.
#[derive(Debug, Clone)]
pub struct EventSink {
    url: String,
    handle: HandleId,
    tx: UnboundedSender<ConnectionSignal>,
}

impl EventSink {
    pub fn new(url: impl Into<String>, handle: HandleId, tx: UnboundedSender<ConnectionSignal>) -> Self {
        Self {
            url: url.into(),
            handle,
            tx,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn handle(&self) -> HandleId {
        self.handle
    }

    pub fn opened(&self) {
        self.post(TransportEvent::Opened);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.post(TransportEvent::Message(text.into()));
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.post(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    pub fn errored(&self, detail: impl Into<String>) {
        self.post(TransportEvent::Errored(detail.into()));
    }

    fn post(&self, event: TransportEvent) {
        // The receiver only goes away with the session manager itself
        let _ = self.tx.send(ConnectionSignal::Transport {
            url: self.url.clone(),
            handle: self.handle,
            event,
        });
    }
}

/// Opens connections to contact addresses.
pub trait Transport: Send + Sync {
    /// Start connecting to `url`. Returns immediately; progress is reported
    /// through `sink`.
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn TransportHandle>;
}

/// A single live (or connecting) connection.
pub trait TransportHandle: Send {
    /// Transmit a text frame.
    fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Ask the peer to close the connection with `code` and `reason`.
    fn close(&self, code: u16, reason: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn sink_tags_events_with_url_and_handle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = EventSink::new("wss://a.example", HandleId(7), tx);

        sink.opened();
        sink.message("hi");
        sink.errored("boom");
        sink.closed(1000, "bye");

        let expected = [
            TransportEvent::Opened,
            TransportEvent::Message("hi".to_string()),
            TransportEvent::Errored("boom".to_string()),
            TransportEvent::Closed {
                code: 1000,
                reason: "bye".to_string(),
            },
        ];
        for want in expected {
            match rx.try_recv().unwrap() {
                ConnectionSignal::Transport { url, handle, event } => {
                    assert_eq!(url, "wss://a.example");
                    assert_eq!(handle, HandleId(7));
                    assert_eq!(event, want);
                }
                other => panic!("Expected transport signal, got {other:?}"),
            }
        }
    }

    #[test]
    fn sink_ignores_dropped_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let sink = EventSink::new("wss://a.example", HandleId(1), tx);

        // Should not panic
        sink.opened();
    }

    #[test]
    fn handle_id_display() {
        assert_eq!(HandleId(3).to_string(), "#3");
    }
}
