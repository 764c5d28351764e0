//! Session configuration.

use std::time::Duration;

/// Delay between a transport closing and the next connect attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1500);

/// Close code sent when a contact is removed or the session shuts down.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Configuration for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fixed delay before reconnecting a closed connection.
    pub reconnect_delay: Duration,

    /// Accept plain `ws://` addresses in addition to `wss://`.
    pub allow_insecure: bool,
}

impl SessionConfig {
    /// URL schemes accepted by `add_contact`.
    pub fn allowed_schemes(&self) -> &'static [&'static str] {
        if self.allow_insecure {
            &["wss", "ws"]
        } else {
            &["wss"]
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            allow_insecure: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_fixed_delay_and_secure_scheme() {
        let config = SessionConfig::default();
        assert_eq!(config.reconnect_delay, Duration::from_millis(1500));
        assert_eq!(config.allowed_schemes(), &["wss"]);
    }

    #[test]
    fn allow_insecure_adds_ws() {
        let config = SessionConfig {
            allow_insecure: true,
            ..SessionConfig::default()
        };
        assert!(config.allowed_schemes().contains(&"ws"));
        assert!(config.allowed_schemes().contains(&"wss"));
    }
}
