//! Slash commands for interactive mode

use sous_chat::{Conversation, Role};

use crate::render::truncate_chars;

/// Result of executing a slash command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Clear the conversation
    Clear,
    /// Show a message to the user (not sent to the assistant)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse and execute a slash command
pub fn execute_command(input: &str, conversation: &Conversation) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let command = rest.split_whitespace().next().unwrap_or("").to_lowercase();

    Some(match command.as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "clear" | "c" => CommandResult::Clear,

        "quit" | "exit" | "q" => CommandResult::Exit,

        "history" => CommandResult::Message(history(conversation)),

        _ => CommandResult::Unknown(command),
    })
}

fn history(conversation: &Conversation) -> String {
    if conversation.is_empty() {
        return "No messages yet.".to_string();
    }
    conversation
        .messages()
        .iter()
        .enumerate()
        .map(|(i, msg)| {
            let role = match msg.role() {
                Role::User => "you",
                Role::Assistant => "sous",
            };
            let preview = truncate_chars(&msg.text().replace('\n', " "), 60);
            format!("  {}: [{}] {}", i, role, preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?        Show this help message
  /history             List the messages in this conversation
  /clear, /c           Start a fresh conversation
  /quit, /exit, /q     Exit sous

Anything else is sent to the cooking assistant."#
        .to_string()
}
