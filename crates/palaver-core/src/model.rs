//! Data model shared by the session manager, persistence and observers.
//!
//! # Wire Format
//!
//! Contacts and messages are stored as camelCase JSON:
//!
//! ```text
//! { "url": "wss://peer.example/chat", "name": "Ada", "unread": 2, "lastMessageAt": 1718000000000 }
//! { "id": "0b6f...", "from": "them", "text": "hi", "sentAt": 1718000000000 }
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Trim a display field, treating blank input as absent.
pub(crate) fn normalize_field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// Contacts
// ============================================================================

/// A remote peer reachable at a transport address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Transport address, unique across the contact list.
    pub url: String,

    /// User-visible name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Avatar image address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    /// Inbound messages received since the contact was last selected.
    #[serde(default)]
    pub unread: u32,

    /// Timestamp (epoch ms) of the most recent message in either direction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<i64>,
}

impl Contact {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: None,
            photo_url: None,
            unread: 0,
            last_message_at: None,
        }
    }

    /// Name to show in lists, falling back to the address.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.url)
    }

    /// Merge the `Some` fields of a patch into this contact.
    pub fn apply(&mut self, patch: ContactPatch) {
        if let Some(name) = patch.name {
            self.name = normalize_field(Some(name));
        }
        if let Some(photo_url) = patch.photo_url {
            self.photo_url = normalize_field(Some(photo_url));
        }
        if let Some(unread) = patch.unread {
            self.unread = unread;
        }
        if let Some(at) = patch.last_message_at {
            self.last_message_at = Some(at);
        }
    }
}

/// Partial update for a [`Contact`]. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub photo_url: Option<String>,
    pub unread: Option<u32>,
    pub last_message_at: Option<i64>,
}

impl ContactPatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn photo_url(photo_url: impl Into<String>) -> Self {
        Self {
            photo_url: Some(photo_url.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Sent from this client.
    Me,
    /// Received from the peer.
    Them,
}

/// A single chat message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub from: Direction,
    pub text: String,
    pub sent_at: i64,
}

impl Message {
    /// Create a message stamped with a fresh id and the current time.
    pub fn new(from: Direction, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            from,
            text: text.into(),
            sent_at: now_millis(),
        }
    }

    pub fn outgoing(text: impl Into<String>) -> Self {
        Self::new(Direction::Me, text)
    }

    pub fn incoming(text: impl Into<String>) -> Self {
        Self::new(Direction::Them, text)
    }
}

// ============================================================================
// Connection state
// ============================================================================

/// Lifecycle state of a contact's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No connection has been materialized.
    #[default]
    Idle,
    /// A handle was opened and the handshake has not completed.
    Connecting,
    Open,
    /// The transport closed; a reconnect is pending.
    Closed,
    /// The transport reported an error; a close normally follows.
    Error,
}

impl ConnectionState {
    /// Whether an explicit close should be sent to the live handle.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Connecting)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Error => "error",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod contact {
        use super::*;

        #[test]
        fn new_starts_with_no_unread() {
            let contact = Contact::new("wss://peer.example/chat");
            assert_eq!(contact.unread, 0);
            assert!(contact.name.is_none());
            assert!(contact.last_message_at.is_none());
        }

        #[test]
        fn display_name_falls_back_to_url() {
            let mut contact = Contact::new("wss://peer.example/chat");
            assert_eq!(contact.display_name(), "wss://peer.example/chat");

            contact.name = Some("Ada".to_string());
            assert_eq!(contact.display_name(), "Ada");
        }

        #[test]
        fn apply_merges_only_present_fields() {
            let mut contact = Contact::new("wss://peer.example/chat");
            contact.name = Some("Ada".to_string());
            contact.unread = 3;

            contact.apply(ContactPatch {
                photo_url: Some("https://img.example/ada.png".to_string()),
                ..ContactPatch::default()
            });

            assert_eq!(contact.name.as_deref(), Some("Ada"));
            assert_eq!(contact.photo_url.as_deref(), Some("https://img.example/ada.png"));
            assert_eq!(contact.unread, 3);
        }

        #[test]
        fn apply_blank_name_clears_it() {
            let mut contact = Contact::new("wss://peer.example/chat");
            contact.name = Some("Ada".to_string());

            contact.apply(ContactPatch::name("   "));

            assert!(contact.name.is_none());
        }

        #[test]
        fn serializes_camel_case_and_skips_absent_fields() {
            let mut contact = Contact::new("wss://peer.example/chat");
            contact.last_message_at = Some(42);

            let json = serde_json::to_value(&contact).unwrap();

            assert_eq!(json["url"], "wss://peer.example/chat");
            assert_eq!(json["lastMessageAt"], 42);
            assert_eq!(json["unread"], 0);
            assert!(json.get("name").is_none());
            assert!(json.get("photoUrl").is_none());
        }

        #[test]
        fn deserializes_with_missing_optional_fields() {
            let contact: Contact =
                serde_json::from_str(r#"{"url":"wss://peer.example/chat"}"#).unwrap();
            assert_eq!(contact, Contact::new("wss://peer.example/chat"));
        }
    }

    mod message {
        use super::*;

        #[test]
        fn new_generates_unique_ids() {
            let a = Message::outgoing("hello");
            let b = Message::outgoing("hello");
            assert_ne!(a.id, b.id);
        }

        #[test]
        fn direction_serializes_lowercase() {
            let message = Message::incoming("hi");
            let json = serde_json::to_value(&message).unwrap();
            assert_eq!(json["from"], "them");
            assert!(json.get("sentAt").is_some());
        }
    }

    mod connection_state {
        use super::*;

        #[test]
        fn default_is_idle() {
            assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        }

        #[test]
        fn only_open_and_connecting_are_active() {
            assert!(ConnectionState::Open.is_active());
            assert!(ConnectionState::Connecting.is_active());
            assert!(!ConnectionState::Closed.is_active());
            assert!(!ConnectionState::Error.is_active());
            assert!(!ConnectionState::Idle.is_active());
        }

        #[test]
        fn display_matches_serde_name() {
            let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
            assert_eq!(json, format!("\"{}\"", ConnectionState::Connecting));
        }
    }
}
