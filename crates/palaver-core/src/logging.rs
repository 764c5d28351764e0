//! Per-contact wire logs.
//!
//! Every frame a connection sends or receives can be appended to
//! `{log_dir}/{key}.log` as `[timestamp] DIRECTION: text`.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{SecondsFormat, Utc};

use crate::persistence::escape_key;

/// Shared handle to an append-only wire log. `None` inside means logging is off.
pub type LogHandle = Arc<Mutex<Option<File>>>;

/// Write a timestamped line to the log file (if present).
pub fn log_line(handle: &LogHandle, direction: &str, data: &str) {
    if let Ok(mut guard) = handle.lock() {
        if let Some(ref mut file) = *guard {
            let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
            let _ = writeln!(file, "[{ts}] {direction}: {data}");
            let _ = file.flush();
        }
    }
}

/// Open (or create) the wire log for a contact address.
///
/// The address is escaped into a file-name-safe key. Failures leave the
/// handle disabled rather than erroring.
pub fn open_wire_log(log_dir: Option<&Path>, url: &str) -> LogHandle {
    let file = log_dir.and_then(|dir| {
        std::fs::create_dir_all(dir).ok()?;
        let path = dir.join(format!("{}.log", escape_key(url)));
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(file),
            Err(e) => {
                log::warn!("Failed to open wire log {}: {}", path.display(), e);
                None
            }
        }
    });
    Arc::new(Mutex::new(file))
}
