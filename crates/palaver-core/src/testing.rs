//! Scripted transport for tests: records what the session does and lets the
//! test fire transport events by hand.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::transport::{EventSink, Transport, TransportError, TransportHandle};

#[derive(Default)]
struct Script {
    sinks: HashMap<String, Vec<EventSink>>,
    sent: HashMap<String, Vec<String>>,
    closes: HashMap<String, Vec<(u16, String)>>,
    live: HashMap<String, usize>,
    fail_sends: bool,
}

#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }

    /// Make every subsequent `send` fail (or succeed again).
    pub(crate) fn fail_sends(&self, fail: bool) {
        self.with(|s| s.fail_sends = fail);
    }

    pub(crate) fn open_count(&self, url: &str) -> usize {
        self.with(|s| s.sinks.get(url).map_or(0, Vec::len))
    }

    /// Sink of the most recent handle opened for `url`.
    pub(crate) fn sink(&self, url: &str) -> EventSink {
        self.with(|s| s.sinks.get(url).and_then(|v| v.last().cloned()))
            .unwrap_or_else(|| panic!("no handle opened for {url}"))
    }

    /// Sink of the `n`th handle (0-based) opened for `url`.
    pub(crate) fn sink_at(&self, url: &str, n: usize) -> EventSink {
        self.with(|s| s.sinks.get(url).and_then(|v| v.get(n).cloned()))
            .unwrap_or_else(|| panic!("no handle #{n} for {url}"))
    }

    pub(crate) fn sent(&self, url: &str) -> Vec<String> {
        self.with(|s| s.sent.get(url).cloned().unwrap_or_default())
    }

    pub(crate) fn closes(&self, url: &str) -> Vec<(u16, String)> {
        self.with(|s| s.closes.get(url).cloned().unwrap_or_default())
    }

    pub(crate) fn live_handles(&self, url: &str) -> usize {
        self.with(|s| s.live.get(url).copied().unwrap_or(0))
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, url: &str, sink: EventSink) -> Box<dyn TransportHandle> {
        self.with(|s| {
            s.sinks.entry(url.to_string()).or_default().push(sink);
            *s.live.entry(url.to_string()).or_default() += 1;
        });
        Box::new(ScriptedHandle {
            url: url.to_string(),
            script: Arc::clone(&self.script),
        })
    }
}

struct ScriptedHandle {
    url: String,
    script: Arc<Mutex<Script>>,
}

impl TransportHandle for ScriptedHandle {
    fn send(&self, text: &str) -> Result<(), TransportError> {
        let mut script = self.script.lock().unwrap();
        if script.fail_sends {
            return Err(TransportError::Send("scripted failure".to_string()));
        }
        script
            .sent
            .entry(self.url.clone())
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    fn close(&self, code: u16, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .closes
            .entry(self.url.clone())
            .or_default()
            .push((code, reason.to_string()));
    }
}

impl Drop for ScriptedHandle {
    fn drop(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            if let Some(live) = script.live.get_mut(&self.url) {
                *live = live.saturating_sub(1);
            }
        }
    }
}
