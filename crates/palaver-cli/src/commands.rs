//! Parsing of input lines into commands.
//!
//! Lines starting with `/` are commands; anything else is text for the
//! selected contact.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/add <url> [name...]`
    Add { url: String, name: Option<String> },
    /// `/select <url | list number>`
    Select(String),
    /// `/name <name...>` for the selected contact
    Name(String),
    /// `/photo <url>` for the selected contact
    Photo(String),
    /// `/remove`, asks for confirmation
    Remove,
    List,
    History,
    Help,
    Quit,
    /// Plain text for the selected contact
    Say(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

pub const HELP: &str = "\
Commands:
  /add <url> [name]     add a contact (wss:// address)
  /select <url | n>     open a conversation
  /name <name>          rename the selected contact
  /photo <url>          set the selected contact's photo
  /remove               remove the selected contact
  /list                 list contacts
  /history              show the selected conversation
  /help                 show this help
  /quit                 exit
Anything else is sent to the selected contact.";

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Option<Result<Command, ParseError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return Some(Ok(Command::Say(line.to_string())));
    };

    Some(parse_command(rest))
}

fn parse_command(rest: &str) -> Result<Command, ParseError> {
    let (word, arg) = match rest.split_once(char::is_whitespace) {
        Some((word, arg)) => (word, arg.trim()),
        None => (rest, ""),
    };

    let command = match word {
        "add" => {
            let (url, name) = match arg.split_once(char::is_whitespace) {
                Some((url, name)) => (url, Some(name.trim().to_string())),
                None => (arg, None),
            };
            if url.is_empty() {
                return Err(ParseError::Usage("/add <url> [name]"));
            }
            Command::Add {
                url: url.to_string(),
                name,
            }
        }
        "select" | "s" => Command::Select(required(arg, "/select <url | n>")?),
        "name" => Command::Name(required(arg, "/name <name>")?),
        "photo" => Command::Photo(required(arg, "/photo <url>")?),
        "remove" | "rm" => Command::Remove,
        "list" | "ls" => Command::List,
        "history" => Command::History,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(command)
}

fn required(arg: &str, usage: &'static str) -> Result<String, ParseError> {
    if arg.is_empty() {
        Err(ParseError::Usage(usage))
    } else {
        Ok(arg.to_string())
    }
}

/// `y` / `yes`, case-insensitive.
pub fn is_confirmation(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
