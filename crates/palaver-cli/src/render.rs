//! Plain-text rendering of session state.

use chrono::{Local, TimeZone};
use palaver_core::{ConnectionState, Contact, Direction, Message};

/// `HH:MM` in local time, or `--:--` for an unrepresentable timestamp.
pub fn clock(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// One numbered line per contact in stored order. Numbers are what
/// `/select <n>` accepts.
pub fn contact_list(
    contacts: &[Contact],
    selected: Option<&str>,
    state_of: impl Fn(&str) -> ConnectionState,
) -> String {
    if contacts.is_empty() {
        return "No contacts yet. Add one with /add <url> [name]".to_string();
    }

    let mut out = String::new();
    for (index, contact) in contacts.iter().enumerate() {
        let marker = if selected == Some(contact.url.as_str()) { '*' } else { ' ' };
        let unread = if contact.unread > 0 {
            format!(" ({} unread)", contact.unread)
        } else {
            String::new()
        };
        let last = contact
            .last_message_at
            .map(|at| format!(" last {}", clock(at)))
            .unwrap_or_default();
        out.push_str(&format!(
            "{marker}{:>3}. {} <{}> [{}]{unread}{last}\n",
            index + 1,
            contact.display_name(),
            contact.url,
            state_of(&contact.url),
        ));
    }
    out.pop();
    out
}

pub fn message_line(message: &Message, peer: &str) -> String {
    let who = match message.from {
        Direction::Me => "me",
        Direction::Them => peer,
    };
    format!("[{}] {who}: {}", clock(message.sent_at), message.text)
}

pub fn history(messages: &[Message], peer: &str) -> String {
    if messages.is_empty() {
        return format!("No messages with {peer} yet.");
    }
    messages
        .iter()
        .map(|m| message_line(m, peer))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(url: &str, name: Option<&str>, unread: u32) -> Contact {
        let mut contact = Contact::new(url);
        contact.name = name.map(str::to_string);
        contact.unread = unread;
        contact
    }

    #[test]
    fn empty_list_hints_at_add() {
        assert!(contact_list(&[], None, |_| ConnectionState::Idle).contains("/add"));
    }

    #[test]
    fn list_marks_selection_and_unread() {
        let mut contacts = vec![
            contact("wss://a.example", Some("Ada"), 0),
            contact("wss://b.example", None, 3),
        ];
        contacts[1].last_message_at = Some(0);

        let text = contact_list(&contacts, Some("wss://a.example"), |url| {
            if url == "wss://a.example" {
                ConnectionState::Open
            } else {
                ConnectionState::Closed
            }
        });
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('*'));
        assert!(lines[0].contains("Ada"));
        assert!(lines[0].contains("[open]"));
        assert!(lines[1].contains("wss://b.example"));
        assert!(lines[1].contains("(3 unread)"));
        assert!(lines[1].contains("[closed]"));
        assert!(lines[1].contains(" last "));
        assert!(!lines[0].contains(" last "));
    }

    #[test]
    fn history_labels_directions() {
        let messages = vec![Message::outgoing("hi"), Message::incoming("hello")];
        let text = history(&messages, "Ada");
        let lines: Vec<_> = text.lines().collect();
        assert!(lines[0].ends_with("me: hi"));
        assert!(lines[1].ends_with("Ada: hello"));
    }

    #[test]
    fn empty_history() {
        assert!(history(&[], "Ada").contains("No messages"));
    }

    #[test]
    fn clock_is_hours_and_minutes() {
        assert_eq!(clock(0).len(), 5);
        assert_eq!(clock(i64::MAX), "--:--");
    }
}
