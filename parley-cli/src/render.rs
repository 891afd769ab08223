//! Plain-text rendering of store state.

use parley_client::{Conversation, ConversationState, Message, Role};
use parley_common::util::{single_line, truncate_with_ellipsis};

const TITLE_WIDTH: usize = 48;

pub fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!("{speaker}> {}", message.content)
}

pub fn format_conversation(conversation: &Conversation, active: bool) -> String {
    let marker = if active { '*' } else { ' ' };
    let title = if conversation.title.trim().is_empty() {
        "(untitled)".to_string()
    } else {
        truncate_with_ellipsis(&single_line(&conversation.title), TITLE_WIDTH)
    };
    format!(
        "{marker} {}  {}  {title}",
        conversation.id,
        conversation.created_at.format("%Y-%m-%d %H:%M")
    )
}

pub fn format_conversation_list(state: &ConversationState) -> Vec<String> {
    if state.conversations.is_empty() {
        return vec!["No conversations yet.".to_string()];
    }
    state
        .conversations
        .iter()
        .map(|c| {
            let active = state.active_conversation_id.as_deref() == Some(c.id.as_str());
            format_conversation(c, active)
        })
        .collect()
}

/// Tracks what has been printed so each state update only emits new lines.
#[derive(Debug, Default)]
pub struct Transcript {
    shown: Vec<String>,
    conversation: Option<String>,
}

impl Transcript {
    /// Lines to print for `state`, given everything printed so far.
    pub fn update(&mut self, state: &ConversationState) -> Vec<String> {
        let continues = self
            .shown
            .iter()
            .zip(&state.messages)
            .all(|(shown, message)| *shown == message.id)
            && self.shown.len() <= state.messages.len();
        // A new conversation adopting its server id is the same transcript.
        let same_conversation = self.conversation == state.active_conversation_id
            || (self.conversation.is_none() && !self.shown.is_empty() && continues);

        let mut lines = Vec::new();
        let skip = if same_conversation && continues {
            self.shown.len()
        } else {
            lines.push(match &state.active_conversation_id {
                Some(id) => format!("--- conversation {id} ---"),
                None => "--- new conversation ---".to_string(),
            });
            self.shown.clear();
            0
        };

        for message in &state.messages[skip..] {
            lines.push(format_message(message));
            self.shown.push(message.id.clone());
        }
        self.conversation = state.active_conversation_id.clone();
        lines
    }
}
