//! Interactive chat loop.
//!
//! Lines are read from stdin; anything not starting with `/` is sent as a
//! message. Output is driven by a store subscription, so replies, loaded
//! histories and background list refreshes all render the same way.

use anyhow::Result;
use parley_client::{ConversationStore, SendOutcome, StoreError};
use tokio::io::{self, AsyncBufReadExt, BufReader};

use crate::render::{format_conversation_list, Transcript};

const HELP: &str = "\
Commands:
  /new          start a new conversation
  /list         list your conversations
  /open ID      open a conversation
  /delete ID    delete a conversation
  /help         show this help
  /quit         leave the chat";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Send(String),
    New,
    List,
    Open(String),
    Delete(String),
    Help,
    Quit,
    /// Malformed input, with a hint for the user
    Invalid(String),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(ReplCommand::Send(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next().map(str::to_string);

    let parsed = match (name, arg) {
        ("new", None) => ReplCommand::New,
        ("list" | "ls", None) => ReplCommand::List,
        ("open", Some(id)) => ReplCommand::Open(id),
        ("delete" | "rm", Some(id)) => ReplCommand::Delete(id),
        ("help" | "?", None) => ReplCommand::Help,
        ("quit" | "exit", None) => ReplCommand::Quit,
        ("open", None) => ReplCommand::Invalid("usage: /open ID".into()),
        ("delete" | "rm", None) => ReplCommand::Invalid("usage: /delete ID".into()),
        _ => ReplCommand::Invalid(format!("unknown command '/{name}', try /help")),
    };
    Some(parsed)
}

fn report(error: &StoreError) {
    match error {
        StoreError::Busy => eprintln!("! still waiting on the previous request"),
        StoreError::Auth(e) => eprintln!("! not signed in: {e}"),
        StoreError::Network(e) => {
            eprintln!("! {e}");
            eprintln!("  your message was kept; send it again to retry");
        }
    }
}

/// Run the chat loop until `/quit` or end of input.
pub async fn run(store: ConversationStore, open: Option<String>) -> Result<()> {
    if let Some(id) = &open {
        if let Err(e) = store.load_conversation(id).await {
            report(&e);
        }
        if store.state().active_conversation_id.as_deref() != Some(id.as_str()) {
            eprintln!("! could not open conversation {id}; starting a new one");
        }
    }

    let mut updates = store.subscribe();
    let renderer = tokio::spawn(async move {
        let mut transcript = Transcript::default();
        for line in transcript.update(&updates.current()) {
            println!("{line}");
        }
        while let Some(state) = updates.changed().await {
            for line in transcript.update(&state) {
                println!("{line}");
            }
        }
    });

    println!("Type a message, or /help for commands.");

    let mut lines = BufReader::new(io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Some(command) = parse_line(&line) else {
            continue;
        };

        match command {
            ReplCommand::Send(text) => match store.send_message(&text).await {
                Ok(SendOutcome::Stale(_)) => {
                    eprintln!("! reply arrived for a conversation you already left");
                }
                Ok(_) => {}
                Err(e) => report(&e),
            },
            ReplCommand::New => store.create_new_conversation(),
            ReplCommand::List => {
                if let Err(e) = store.load_conversations().await {
                    report(&e);
                }
                for row in format_conversation_list(&store.state()) {
                    println!("{row}");
                }
            }
            ReplCommand::Open(id) => {
                if let Err(e) = store.load_conversation(&id).await {
                    report(&e);
                } else if store.state().active_conversation_id.as_deref() != Some(id.as_str()) {
                    eprintln!("! could not open conversation {id}");
                }
            }
            ReplCommand::Delete(id) => {
                if let Err(e) = store.delete_conversation(&id).await {
                    report(&e);
                }
            }
            ReplCommand::Help => println!("{HELP}"),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(hint) => eprintln!("! {hint}"),
        }
    }

    renderer.abort();
    Ok(())
}
