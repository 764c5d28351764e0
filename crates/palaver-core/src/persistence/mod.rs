//! Persistence port for contacts and per-contact message history.
//!
//! # Overview
//!
//! Two record kinds are stored as JSON blobs in a flat key-value store:
//!
//! ```text
//! palaver.contacts                         # Full contact list
//! palaver.conversation:<contact url>       # One conversation per contact
//! ```
//!
//! # Design Principles
//!
//! ## Last Write Wins
//!
//! Every save replaces the whole blob. There is no merge logic and no
//! atomicity across keys.
//!
//! ## Lenient Loads
//!
//! Missing or malformed data loads as an empty collection. Load never fails.
//!
//! # Stores
//!
//! - [`MemoryStore`] keeps blobs in process memory.
//! - [`FileStore`] keeps one `<escaped key>.json` file per key, written
//!   atomically (temp file, then rename).

mod store;

pub use store::{escape_key, FileStore, KeyValueStore, MemoryStore, StoreError};

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::model::{Contact, Message};

/// Key holding the contact list.
pub const CONTACTS_KEY: &str = "palaver.contacts";

/// Prefix for per-contact conversation keys.
pub const CONVERSATION_PREFIX: &str = "palaver.conversation:";

/// Storage key for a contact's conversation.
pub fn conversation_key(url: &str) -> String {
    format!("{CONVERSATION_PREFIX}{url}")
}

/// Typed load/save of contacts and conversations over a [`KeyValueStore`].
#[derive(Clone)]
pub struct Persistence {
    store: Arc<dyn KeyValueStore>,
}

impl Persistence {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persistence backed by a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Load the contact list. Missing or malformed data yields an empty list.
    pub fn load_contacts(&self) -> Vec<Contact> {
        self.load_list(CONTACTS_KEY)
    }

    /// Replace the stored contact list.
    pub fn save_contacts(&self, contacts: &[Contact]) -> Result<(), StoreError> {
        let json = serde_json::to_string(contacts)?;
        self.store.set(CONTACTS_KEY, &json)
    }

    /// Load a conversation. Missing or malformed data yields an empty history.
    pub fn load_conversation(&self, url: &str) -> Vec<Message> {
        self.load_list(&conversation_key(url))
    }

    /// Replace the stored conversation for `url`.
    pub fn save_conversation(&self, url: &str, messages: &[Message]) -> Result<(), StoreError> {
        let json = serde_json::to_string(messages)?;
        self.store.set(&conversation_key(url), &json)
    }

    fn load_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                log::warn!("Failed to read {key}: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("Ignoring malformed data under {key}: {e}");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
