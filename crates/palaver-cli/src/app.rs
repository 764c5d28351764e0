//! Terminal front end over a [`SessionManager`].
//!
//! Input lines become intents; session events become output lines. Nothing
//! here prints directly so the flow can be tested without a terminal.

use std::collections::HashSet;

use palaver_core::{ConnectionState, ContactPatch, Direction, SessionEvent, SessionManager};

use crate::commands::{self, Command, HELP};
use crate::render;

pub enum Flow {
    Continue,
    Quit,
}

pub struct App {
    manager: SessionManager,
    /// Contact awaiting a y/N answer to `/remove`.
    pending_removal: Option<String>,
    /// Addresses last announced as connected.
    online: HashSet<String>,
}

impl App {
    pub fn new(manager: SessionManager) -> Self {
        Self {
            manager,
            pending_removal: None,
            online: HashSet::new(),
        }
    }

    pub fn manager(&self) -> &SessionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut SessionManager {
        &mut self.manager
    }

    pub fn contact_list(&self) -> String {
        render::contact_list(
            self.manager.list_contacts(),
            self.manager.selected_url(),
            |url| self.manager.state_of(url),
        )
    }

    /// Apply one input line, appending anything to show to `out`.
    pub fn handle_line(&mut self, line: &str, out: &mut Vec<String>) -> Flow {
        if let Some(url) = self.pending_removal.take() {
            if commands::is_confirmation(line) {
                self.manager.remove_contact(&url);
                out.push(format!("Removed {url}"));
            } else {
                out.push("Kept contact.".to_string());
            }
            return Flow::Continue;
        }

        let command = match commands::parse(line) {
            None => return Flow::Continue,
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                out.push(e.to_string());
                return Flow::Continue;
            }
        };

        match command {
            Command::Add { url, name } => {
                if let Err(e) = self.manager.add_contact(&url, name, None) {
                    out.push(e.to_string());
                }
            }
            Command::Select(target) => match self.resolve(&target) {
                Some(url) => self.manager.select_contact(&url),
                None => out.push(format!("No contact '{target}'. See /list")),
            },
            Command::Name(name) => match self.selected() {
                Some(url) => self.manager.update_contact(&url, ContactPatch::name(name)),
                None => out.push(no_selection()),
            },
            Command::Photo(photo_url) => match self.selected() {
                Some(url) => self.manager.update_contact(&url, ContactPatch::photo_url(photo_url)),
                None => out.push(no_selection()),
            },
            Command::Remove => match self.selected() {
                Some(url) => {
                    out.push(format!("Remove {url} and its connection? [y/N]"));
                    self.pending_removal = Some(url);
                }
                None => out.push(no_selection()),
            },
            Command::List => out.push(self.contact_list()),
            Command::History => match self.manager.selected_contact() {
                Some(contact) => out.push(render::history(
                    self.manager.visible_messages(),
                    contact.display_name(),
                )),
                None => out.push(no_selection()),
            },
            Command::Help => out.push(HELP.to_string()),
            Command::Quit => return Flow::Quit,
            Command::Say(text) => match self.selected() {
                Some(url) => self.manager.send(&url, &text),
                None => out.push(no_selection()),
            },
        }
        Flow::Continue
    }

    /// Describe a session event, if it is worth a line of output.
    ///
    /// Connectivity is announced on open and on the first close or error
    /// after it, so a peer that stays unreachable is not reported on every
    /// retry.
    pub fn describe(&mut self, event: &SessionEvent) -> Option<String> {
        let peer = event.url().map(|url| self.peer_name(url))?;
        match event {
            SessionEvent::SelectionChanged { .. } => Some(format!(
                "-- {peer} --\n{}",
                render::history(self.manager.visible_messages(), &peer)
            )),
            SessionEvent::MessageAppended { url, message } if message.from == Direction::Them => {
                if self.manager.selected_url() == Some(url.as_str()) {
                    Some(render::message_line(message, &peer))
                } else {
                    Some(format!("(new message from {peer})"))
                }
            }
            SessionEvent::ConnectionStateChanged { url, state } => match state {
                ConnectionState::Open => {
                    self.online.insert(url.clone());
                    Some(format!("[{peer}] connected"))
                }
                ConnectionState::Closed | ConnectionState::Error => self
                    .online
                    .remove(url)
                    .then(|| format!("[{peer}] disconnected ({state}), reconnecting")),
                ConnectionState::Idle | ConnectionState::Connecting => None,
            },
            _ => None,
        }
    }

    fn selected(&self) -> Option<String> {
        self.manager.selected_contact().map(|c| c.url.clone())
    }

    /// A contact by 1-based list number or by address.
    fn resolve(&self, target: &str) -> Option<String> {
        let contacts = self.manager.list_contacts();
        if let Ok(n) = target.parse::<usize>() {
            return n.checked_sub(1).and_then(|i| contacts.get(i)).map(|c| c.url.clone());
        }
        contacts
            .iter()
            .find(|c| c.url == target)
            .map(|c| c.url.clone())
    }

    fn peer_name(&self, url: &str) -> String {
        self.manager
            .contact(url)
            .map_or_else(|| url.to_string(), |c| c.display_name().to_string())
    }
}

fn no_selection() -> String {
    "No contact selected. Use /select".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::transport::EventSink;
    use palaver_core::{
        EventBus, Message, Persistence, SessionConfig, Transport, TransportError, TransportHandle,
    };
    use std::sync::Arc;

    /// Transport whose connections never open.
    struct Silent;

    struct SilentHandle;

    impl Transport for Silent {
        fn open(&self, _url: &str, _sink: EventSink) -> Box<dyn TransportHandle> {
            Box::new(SilentHandle)
        }
    }

    impl TransportHandle for SilentHandle {
        fn send(&self, _text: &str) -> Result<(), TransportError> {
            Err(TransportError::NotOpen)
        }

        fn close(&self, _code: u16, _reason: &str) {}
    }

    fn app() -> App {
        App::new(SessionManager::new(
            SessionConfig::default(),
            Arc::new(Silent),
            Persistence::in_memory(),
            Arc::new(EventBus::new()),
        ))
    }

    fn run(app: &mut App, line: &str) -> Vec<String> {
        let mut out = Vec::new();
        app.handle_line(line, &mut out);
        out
    }

    #[tokio::test]
    async fn add_select_and_say() {
        let mut app = app();

        run(&mut app, "/add wss://ada.example Ada");
        run(&mut app, "/select 1");
        run(&mut app, "hello");

        assert_eq!(app.manager().selected_url(), Some("wss://ada.example"));
        let messages = app.manager().visible_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(app.manager().pending_count("wss://ada.example"), 1);
    }

    #[tokio::test]
    async fn invalid_address_is_reported() {
        let mut app = app();
        let out = run(&mut app, "/add http://ada.example");
        assert!(out[0].contains("Invalid contact address"));
        assert!(app.manager().list_contacts().is_empty());
    }

    #[tokio::test]
    async fn say_without_selection_is_refused() {
        let mut app = app();
        let out = run(&mut app, "hello");
        assert!(out[0].contains("No contact selected"));
    }

    #[tokio::test]
    async fn remove_requires_confirmation() {
        let mut app = app();
        run(&mut app, "/add wss://ada.example");
        run(&mut app, "/select wss://ada.example");

        run(&mut app, "/remove");
        let out = run(&mut app, "n");
        assert_eq!(out, vec!["Kept contact."]);
        assert_eq!(app.manager().list_contacts().len(), 1);

        run(&mut app, "/remove");
        run(&mut app, "y");
        assert!(app.manager().list_contacts().is_empty());
        assert!(!app.manager().has_connection("wss://ada.example"));
    }

    #[tokio::test]
    async fn rename_selected() {
        let mut app = app();
        run(&mut app, "/add wss://ada.example");
        run(&mut app, "/s 1");

        run(&mut app, "/name Ada Lovelace");

        assert_eq!(
            app.manager().selected_contact().unwrap().display_name(),
            "Ada Lovelace"
        );
    }

    #[tokio::test]
    async fn unknown_selection() {
        let mut app = app();
        assert!(run(&mut app, "/select 3")[0].contains("No contact"));
        assert!(run(&mut app, "/select 0")[0].contains("No contact"));
    }

    #[tokio::test]
    async fn quit() {
        let mut app = app();
        let mut out = Vec::new();
        assert!(matches!(app.handle_line("/quit", &mut out), Flow::Quit));
    }

    #[tokio::test]
    async fn describes_inbound_for_background_contact() {
        let mut app = app();
        run(&mut app, "/add wss://ada.example Ada");

        let event = SessionEvent::MessageAppended {
            url: "wss://ada.example".to_string(),
            message: Message::incoming("psst"),
        };

        assert_eq!(app.describe(&event).as_deref(), Some("(new message from Ada)"));
    }

    #[tokio::test]
    async fn own_messages_are_not_echoed() {
        let mut app = app();
        let event = SessionEvent::MessageAppended {
            url: "wss://ada.example".to_string(),
            message: Message::outgoing("hi"),
        };
        assert!(app.describe(&event).is_none());
    }

    fn state(url: &str, state: ConnectionState) -> SessionEvent {
        SessionEvent::ConnectionStateChanged {
            url: url.to_string(),
            state,
        }
    }

    #[tokio::test]
    async fn unreachable_peer_is_not_reported_on_every_retry() {
        let mut app = app();
        let url = "wss://ada.example";

        for _ in 0..3 {
            assert!(app.describe(&state(url, ConnectionState::Connecting)).is_none());
            assert!(app.describe(&state(url, ConnectionState::Error)).is_none());
            assert!(app.describe(&state(url, ConnectionState::Closed)).is_none());
        }
    }

    #[tokio::test]
    async fn first_drop_after_open_is_reported_once() {
        let mut app = app();
        let url = "wss://ada.example";

        assert!(app.describe(&state(url, ConnectionState::Open)).unwrap().contains("connected"));
        let dropped = app.describe(&state(url, ConnectionState::Error)).unwrap();
        assert!(dropped.contains("disconnected"));
        assert!(app.describe(&state(url, ConnectionState::Closed)).is_none());
        assert!(app.describe(&state(url, ConnectionState::Connecting)).is_none());
    }
}
