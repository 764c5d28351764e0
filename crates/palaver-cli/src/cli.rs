//! Command-line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use palaver_core::paths::default_data_dir;
use palaver_core::{SessionConfig, WsTransport};

#[derive(Parser, Debug)]
#[command(author, version, about = "Chat with WebSocket contacts from the terminal", long_about = None)]
pub struct Args {
    /// Directory holding contacts and conversations (default: ~/.config/palaver)
    #[arg(short, long, env = "PALAVER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Milliseconds to wait before reconnecting a closed connection
    #[arg(long, env = "PALAVER_RECONNECT_MS", default_value_t = 1500)]
    pub reconnect_ms: u64,

    /// Accept plain ws:// addresses
    #[arg(long)]
    pub allow_insecure: bool,

    /// Append every frame to one log file per contact in this directory
    #[arg(long)]
    pub wire_log_dir: Option<PathBuf>,

    /// Keep everything in memory; nothing is written to disk
    #[arg(long, conflicts_with = "data_dir")]
    pub ephemeral: bool,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            reconnect_delay: Duration::from_millis(self.reconnect_ms),
            allow_insecure: self.allow_insecure,
        }
    }

    pub fn transport(&self) -> WsTransport {
        WsTransport::new().with_wire_log_dir(self.wire_log_dir.clone())
    }

    /// The configured data directory, or the per-user default.
    pub fn resolve_data_dir(&self) -> Result<PathBuf, String> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["palaver"]).unwrap();
        let config = args.session_config();
        assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
        assert!(!config.allow_insecure);
        assert!(args.wire_log_dir.is_none());
    }

    #[test]
    fn explicit_flags() {
        let args = Args::try_parse_from([
            "palaver",
            "--data-dir",
            "/tmp/palaver",
            "--reconnect-ms",
            "250",
            "--allow-insecure",
        ])
        .unwrap();
        assert_eq!(args.resolve_data_dir().unwrap(), PathBuf::from("/tmp/palaver"));
        assert_eq!(args.session_config().reconnect_delay, Duration::from_millis(250));
        assert!(args.session_config().allow_insecure);
    }

    #[test]
    fn wire_log_dir_is_a_transport_setting() {
        let args = Args::try_parse_from(["palaver", "--wire-log-dir", "/tmp/wire"]).unwrap();
        assert_eq!(args.wire_log_dir, Some(PathBuf::from("/tmp/wire")));
        assert!(format!("{:?}", args.transport()).contains("/tmp/wire"));
    }

    #[test]
    fn ephemeral_conflicts_with_data_dir() {
        let result = Args::try_parse_from(["palaver", "--ephemeral", "--data-dir", "/tmp/x"]);
        assert!(result.is_err());
    }
}
