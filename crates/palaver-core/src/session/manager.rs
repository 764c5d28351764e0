//! SessionManager - owns every contact's connection and the selection.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use url::Url;

use super::SessionError;
use crate::config::{SessionConfig, NORMAL_CLOSURE};
use crate::connection::{Connection, ConnectionSignal, SendOutcome};
use crate::event_bus::{EventBus, SessionEvent};
use crate::model::{normalize_field, ConnectionState, Contact, ContactPatch, Message};
use crate::persistence::Persistence;
use crate::transport::{EventSink, HandleId, Transport, TransportEvent};

/// Multiplexes one reconnecting connection per contact.
///
/// All mutation goes through `&mut self`. Transport tasks and reconnect
/// timers post [`ConnectionSignal`]s into an internal queue; the owner applies
/// them with [`process_next`](Self::process_next) or
/// [`process_pending`](Self::process_pending).
///
/// Every mutation is persisted (errors logged and swallowed) and then
/// announced on the [`EventBus`].
pub struct SessionManager {
    config: SessionConfig,
    transport: Arc<dyn Transport>,
    persistence: Persistence,
    event_bus: Arc<EventBus>,
    contacts: Vec<Contact>,
    connections: HashMap<String, Connection>,
    selected: Option<String>,
    signal_tx: UnboundedSender<ConnectionSignal>,
    signal_rx: UnboundedReceiver<ConnectionSignal>,
    next_handle: u64,
}

impl SessionManager {
    /// Create a manager and load the stored contact list.
    ///
    /// No connections are opened until a contact is selected, added, sent to,
    /// or hears from its peer.
    pub fn new(
        config: SessionConfig,
        transport: Arc<dyn Transport>,
        persistence: Persistence,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let contacts = persistence.load_contacts();
        log::debug!("Loaded {} contacts", contacts.len());
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        Self {
            config,
            transport,
            persistence,
            event_bus,
            contacts,
            connections: HashMap::new(),
            selected: None,
            signal_tx,
            signal_rx,
            next_handle: 0,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn list_contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn contact(&self, url: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.url == url)
    }

    pub fn selected_url(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// The selected contact, or `None` if nothing is selected or it was removed.
    pub fn selected_contact(&self) -> Option<&Contact> {
        self.selected.as_deref().and_then(|url| self.contact(url))
    }

    /// History of the selected contact's connection, oldest first.
    pub fn visible_messages(&self) -> &[Message] {
        self.selected
            .as_deref()
            .map(|url| self.messages(url))
            .unwrap_or_default()
    }

    /// History of `url`'s connection; empty if it has none.
    pub fn messages(&self, url: &str) -> &[Message] {
        self.connections
            .get(url)
            .map(Connection::messages)
            .unwrap_or_default()
    }

    /// Observe `url`'s lifecycle state.
    ///
    /// With no connection the receiver is detached and reads `Idle`.
    pub fn connection_state(&self, url: &str) -> watch::Receiver<ConnectionState> {
        match self.connections.get(url) {
            Some(connection) => connection.subscribe(),
            None => watch::channel(ConnectionState::Idle).1,
        }
    }

    /// Current lifecycle state of `url`'s connection, `Idle` if it has none.
    pub fn state_of(&self, url: &str) -> ConnectionState {
        self.connections
            .get(url)
            .map_or(ConnectionState::Idle, Connection::state)
    }

    /// Texts waiting for `url`'s connection to open.
    pub fn pending_count(&self, url: &str) -> usize {
        self.connections.get(url).map_or(0, Connection::pending_len)
    }

    pub fn has_connection(&self, url: &str) -> bool {
        self.connections.contains_key(url)
    }

    // ========================================================================
    // Intents
    // ========================================================================

    /// Select `url`, clear its unread count, and make sure it is connected.
    pub fn select_contact(&mut self, url: &str) {
        self.selected = Some(url.to_string());
        if let Some(contact) = self.contact_mut(url) {
            contact.unread = 0;
        }
        self.ensure_connection(url);

        self.event_bus.emit(SessionEvent::SelectionChanged {
            url: self.selected.clone(),
        });
        self.contacts_changed();
    }

    /// Add a contact, or update the display metadata of an existing one.
    ///
    /// New contacts are connected right away so the socket is warm before
    /// the user selects them.
    pub fn add_contact(
        &mut self,
        url: &str,
        name: Option<String>,
        photo_url: Option<String>,
    ) -> Result<(), SessionError> {
        let url = self.validate_address(url)?;

        if self.contact(&url).is_some() {
            let patch = ContactPatch {
                name,
                photo_url,
                ..ContactPatch::default()
            };
            if !patch.is_empty() {
                self.update_contact(&url, patch);
            }
            return Ok(());
        }

        let mut contact = Contact::new(url.clone());
        contact.name = normalize_field(name);
        contact.photo_url = normalize_field(photo_url);
        log::info!("Adding contact '{url}'");
        self.contacts.push(contact);
        self.contacts_changed();

        self.ensure_connection(&url);
        Ok(())
    }

    /// Merge `patch` into the contact at `url`. Unknown addresses are ignored.
    pub fn update_contact(&mut self, url: &str, patch: ContactPatch) {
        match self.contact_mut(url) {
            Some(contact) => contact.apply(patch),
            None => return,
        }
        self.contacts_changed();
    }

    /// Close and discard `url`'s connection and delete the contact.
    ///
    /// Idempotent. No signal for the removed connection is acted on afterwards.
    pub fn remove_contact(&mut self, url: &str) {
        if let Some(mut connection) = self.connections.remove(url) {
            log::info!("Closing connection to removed contact '{url}'");
            connection.shutdown(NORMAL_CLOSURE, "contact removed");
        }

        let before = self.contacts.len();
        self.contacts.retain(|c| c.url != url);
        if self.contacts.len() != before {
            self.contacts_changed();
        }
    }

    /// Record an outgoing message and transmit it, or queue it until the
    /// connection opens.
    ///
    /// Never fails from the caller's point of view. Blank text is ignored.
    pub fn send(&mut self, url: &str, text: &str) {
        if text.trim().is_empty() {
            log::debug!("Ignoring empty message to '{url}'");
            return;
        }

        let message = Message::outgoing(text);
        let sent_at = message.sent_at;

        let connection = self.ensure_connection(url);
        connection.push_message(message.clone());
        if connection.try_send(text) == SendOutcome::Queued {
            log::debug!("Queued message to '{url}' until the connection opens");
        }
        self.conversation_changed(url, message);

        self.update_contact(
            url,
            ContactPatch {
                last_message_at: Some(sent_at),
                ..ContactPatch::default()
            },
        );
    }

    /// Close every connection gracefully, keeping contacts and history.
    pub fn close_all(&mut self) {
        for connection in self.connections.values_mut() {
            connection.shutdown(NORMAL_CLOSURE, "session closed");
        }
    }

    // ========================================================================
    // Signal pump
    // ========================================================================

    /// Wait for the next transport event or reconnect timer and apply it.
    ///
    /// Returns `false` only if the signal queue has shut down.
    pub async fn process_next(&mut self) -> bool {
        match self.signal_rx.recv().await {
            Some(signal) => {
                self.handle_signal(signal);
                true
            }
            None => false,
        }
    }

    /// Apply every signal already queued without waiting. Returns how many ran.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.signal_rx.try_recv() {
                Ok(signal) => {
                    self.handle_signal(signal);
                    handled += 1;
                }
                Err(_) => return handled,
            }
        }
    }

    /// Apply one signal.
    ///
    /// Signals for addresses without a connection, from superseded handles,
    /// or from timers of a discarded connection are dropped.
    pub fn handle_signal(&mut self, signal: ConnectionSignal) {
        match signal {
            ConnectionSignal::Transport { url, handle, event } => {
                self.handle_transport_event(&url, handle, event);
            }
            ConnectionSignal::ReconnectDue { url, connection } => {
                let current = self.connections.get(&url).map(Connection::id);
                if current != Some(connection) {
                    log::debug!("Dropping reconnect for discarded connection '{url}'");
                    return;
                }
                self.reconnect(&url);
            }
        }
    }

    fn handle_transport_event(&mut self, url: &str, handle: HandleId, event: TransportEvent) {
        let Some(connection) = self.connections.get_mut(url) else {
            log::debug!("Dropping {event:?} for unknown connection '{url}'");
            return;
        };
        if !connection.is_current(handle) {
            log::debug!("Dropping {event:?} from superseded handle {handle} for '{url}'");
            return;
        }

        match event {
            TransportEvent::Opened => {
                log::info!("Connected to '{url}'");
                connection.set_state(ConnectionState::Open);
                let queued = connection.pending_len();
                if queued > 0 {
                    let sent = connection.flush_pending();
                    log::debug!("Flushed {sent}/{queued} queued messages to '{url}'");
                }
                self.state_changed(url, ConnectionState::Open);
            }
            TransportEvent::Message(text) => self.receive(url, text),
            TransportEvent::Closed { code, reason } => {
                log::info!(
                    "Connection to '{url}' closed ({code}) {reason}; reconnecting in {:?}",
                    self.config.reconnect_delay
                );
                connection.set_state(ConnectionState::Closed);
                connection.schedule_reconnect(self.config.reconnect_delay, self.signal_tx.clone());
                self.state_changed(url, ConnectionState::Closed);
            }
            TransportEvent::Errored(detail) => {
                log::warn!("Connection to '{url}' errored: {detail}");
                connection.set_state(ConnectionState::Error);
                self.state_changed(url, ConnectionState::Error);
            }
        }
    }

    fn reconnect(&mut self, url: &str) {
        let sink = self.next_sink(url);
        let Some(connection) = self.connections.get_mut(url) else {
            return;
        };
        log::debug!("Reconnecting to '{url}'");
        connection.open(self.transport.as_ref(), sink);
        self.state_changed(url, ConnectionState::Connecting);
    }

    /// Append an inbound message and bump the contact's activity.
    fn receive(&mut self, url: &str, text: String) {
        let message = Message::incoming(text);
        let sent_at = message.sent_at;
        if let Some(connection) = self.connections.get_mut(url) {
            connection.push_message(message.clone());
        }
        self.conversation_changed(url, message);

        let is_selected = self.selected.as_deref() == Some(url);
        if self.contact(url).is_none() {
            log::info!("Creating contact for unknown sender '{url}'");
            self.contacts.push(Contact::new(url));
        }
        if let Some(contact) = self.contact_mut(url) {
            if !is_selected {
                contact.unread = contact.unread.saturating_add(1);
            }
            contact.last_message_at = Some(sent_at);
        }
        self.contacts_changed();
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn validate_address(&self, url: &str) -> Result<String, SessionError> {
        let url = url.trim();
        let invalid = || SessionError::InvalidAddress(url.to_string());

        let parsed = Url::parse(url).map_err(|_| invalid())?;
        if !self.config.allowed_schemes().contains(&parsed.scheme()) {
            return Err(invalid());
        }
        match parsed.host_str() {
            Some(host) if !host.is_empty() => Ok(url.to_string()),
            _ => Err(invalid()),
        }
    }

    fn contact_mut(&mut self, url: &str) -> Option<&mut Contact> {
        self.contacts.iter_mut().find(|c| c.url == url)
    }

    fn next_sink(&mut self, url: &str) -> EventSink {
        self.next_handle += 1;
        EventSink::new(url, HandleId(self.next_handle), self.signal_tx.clone())
    }

    /// The connection for `url`, materialized and connecting if it was absent.
    fn ensure_connection(&mut self, url: &str) -> &mut Connection {
        match self.connections.entry(url.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.next_handle += 1;
                let sink = EventSink::new(url, HandleId(self.next_handle), self.signal_tx.clone());
                let history = self.persistence.load_conversation(url);
                log::info!("Opening connection to '{url}' ({} stored messages)", history.len());

                let mut connection = Connection::new(url, history);
                connection.open(self.transport.as_ref(), sink);
                self.event_bus.emit(SessionEvent::ConnectionStateChanged {
                    url: url.to_string(),
                    state: ConnectionState::Connecting,
                });
                entry.insert(connection)
            }
        }
    }

    fn contacts_changed(&self) {
        if let Err(e) = self.persistence.save_contacts(&self.contacts) {
            log::warn!("Failed to save contacts: {e}");
        }
        self.event_bus.emit(SessionEvent::ContactsChanged {
            contacts: self.contacts.clone(),
        });
    }

    fn conversation_changed(&self, url: &str, message: Message) {
        if let Err(e) = self.persistence.save_conversation(url, self.messages(url)) {
            log::warn!("Failed to save conversation with '{url}': {e}");
        }
        self.event_bus.emit(SessionEvent::MessageAppended {
            url: url.to_string(),
            message,
        });
    }

    fn state_changed(&self, url: &str, state: ConnectionState) {
        self.event_bus.emit(SessionEvent::ConnectionStateChanged {
            url: url.to_string(),
            state,
        });
    }
}

// ============================================================================
// TESTS
// ============================================================================
