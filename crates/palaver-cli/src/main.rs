//! palaver - chat with WebSocket contacts from the terminal.

mod app;
mod cli;
mod commands;
mod render;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use palaver_core::{EventBus, FileStore, Persistence, SessionManager};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use app::{App, Flow};
use cli::Args;

const CLOSE_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let persistence = if args.ephemeral {
        Persistence::in_memory()
    } else {
        let dir = args
            .resolve_data_dir()
            .map_err(|e| format!("{e}; pass --data-dir or --ephemeral"))?;
        log::info!("Using data directory {}", dir.display());
        Persistence::new(Arc::new(FileStore::new(dir)))
    };

    let config = args.session_config();
    let transport = Arc::new(args.transport());
    let event_bus = Arc::new(EventBus::new());
    let mut events = event_bus.subscribe();

    let mut app = App::new(SessionManager::new(config, transport, persistence, event_bus));
    println!("{}", app.contact_list());
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut out = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let flow = app.handle_line(&line, &mut out);
                    for text in out.drain(..) {
                        println!("{text}");
                    }
                    if let Flow::Quit = flow {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("Failed to read input: {e}");
                    break;
                }
            },
            _ = app.manager_mut().process_next() => {}
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(text) = app.describe(&event) {
                        println!("{text}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Display fell behind; skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.manager_mut().close_all();
    // Give socket tasks a moment to send their close frames
    tokio::time::sleep(CLOSE_GRACE).await;
    log::info!("Session closed");
    Ok(())
}
