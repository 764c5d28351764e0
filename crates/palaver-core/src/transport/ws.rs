//! WebSocket transport over `tokio-tungstenite`.
//!
//! Each handle owns one background task. The task connects, reports the
//! handshake, forwards inbound text frames, and writes whatever the handle
//! queues. Handshake failures are reported as `errored` followed by
//! `closed(1006)`, the same sequence a browser WebSocket produces.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
};

use super::{EventSink, Transport, TransportError, TransportHandle, ABNORMAL_CLOSURE};
use crate::config::NORMAL_CLOSURE;
use crate::logging::{log_line, open_wire_log, LogHandle};

/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

/// Requests from a handle to its socket task.
enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// [`Transport`] that opens real WebSocket connections.
#[derive(Debug, Clone, Default)]
pub struct WsTransport {
    wire_log_dir: Option<PathBuf>,
}

impl WsTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every frame to `{dir}/{escaped url}.log`.
    #[must_use]
    pub fn with_wire_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.wire_log_dir = dir;
        self
    }
}

impl Transport for WsTransport {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn TransportHandle> {
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(false));
        let log = open_wire_log(self.wire_log_dir.as_deref(), url);

        log::debug!("Connecting to websocket '{url}' ({})", sink.handle());
        tokio::spawn(run_socket(url.to_string(), rx, sink, Arc::clone(&open), log));

        Box::new(WsHandle { outgoing: tx, open })
    }
}

/// Handle to a socket task. Dropping it ends the task.
struct WsHandle {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    open: Arc<AtomicBool>,
}

impl TransportHandle for WsHandle {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(TransportError::NotOpen);
        }
        self.outgoing
            .send(Outgoing::Text(text.to_string()))
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    fn close(&self, code: u16, reason: &str) {
        let _ = self.outgoing.send(Outgoing::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

async fn run_socket(
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    sink: EventSink,
    open: Arc<AtomicBool>,
    log: LogHandle,
) {
    let connect = connect_async(url.as_str());
    tokio::pin!(connect);

    let ws_stream = loop {
        tokio::select! {
            result = &mut connect => match result {
                Ok((ws_stream, _)) => break ws_stream,
                Err(e) => {
                    log::warn!("Failed to connect to websocket '{url}': {e}");
                    sink.errored(e.to_string());
                    sink.closed(ABNORMAL_CLOSURE, e.to_string());
                    return;
                }
            },
            request = outgoing.recv() => match request {
                // Handles refuse text before the handshake; a stray one is dropped
                Some(Outgoing::Text(_)) => continue,
                Some(Outgoing::Close { code, reason }) => {
                    log::debug!("Cancelling connect to '{url}'");
                    sink.closed(code, reason);
                    return;
                }
                None => return,
            },
        }
    };

    log::debug!("WebSocket handshake with '{url}' completed");
    open.store(true, Ordering::Release);
    sink.opened();

    let (mut write, mut read) = ws_stream.split();

    let (code, reason) = loop {
        tokio::select! {
            request = outgoing.recv() => match request {
                Some(Outgoing::Text(text)) => {
                    log_line(&log, "SEND", &text);
                    if let Err(e) = write.send(Message::Text(text)).await {
                        sink.errored(e.to_string());
                        break (ABNORMAL_CLOSURE, e.to_string());
                    }
                }
                Some(Outgoing::Close { code, reason }) => {
                    open.store(false, Ordering::Release);
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.into(),
                    };
                    // Keep reading until the peer answers with its own close frame
                    if let Err(e) = write.send(Message::Close(Some(frame))).await {
                        log::debug!("Close frame to '{url}' not delivered: {e}");
                    }
                }
                None => {
                    let _ = write.close().await;
                    break (NORMAL_CLOSURE, "handle dropped".to_string());
                }
            },
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    log_line(&log, "RECV", &text);
                    sink.message(text);
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                }
                // Binary frames are not part of the chat protocol; pings are answered by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    log::warn!("WebSocket '{url}' error: {e}");
                    sink.errored(e.to_string());
                    break (ABNORMAL_CLOSURE, e.to_string());
                }
                None => break (ABNORMAL_CLOSURE, "connection dropped".to_string()),
            },
        }
    };

    open.store(false, Ordering::Release);
    log::info!("WebSocket '{url}' closed ({code}) {reason}");
    sink.closed(code, reason);
}
