//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` are commands rather than prompts. The command
//! word is case-insensitive; arguments keep their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Start a new session and switch to it
    NewSession,
    /// List sessions
    ListSessions,
    /// Switch to another session
    SwitchSession(String),
    /// Rename the current session
    Rename(String),
    /// Delete a session
    DeleteSession(String),
    /// Show (`None`) or set (`Some`) the system prompt; empty clears it
    SystemPrompt(Option<String>),
    /// Show (`None`) or select (`Some`) the model
    Model(Option<String>),
    /// List available models
    ListModels,
    /// Ask again for the last user message
    Regenerate,
    /// Replace the last user message and ask again
    EditLast(String),
    /// Clear the current session
    Clear,
    /// Export the current session
    Export { path: PathBuf, markdown: bool },
    /// Display help information
    Help,
    /// Exit the interactive session
    Exit,
    /// Not a special command; send as a prompt
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError` for unknown commands and missing or unsupported
/// arguments.
///
/// # Examples
///
/// ```
/// use polychat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/NEW").unwrap(), SpecialCommand::NewSession);
/// assert_eq!(
///     parse_special_command("/model vendor/Model-X").unwrap(),
///     SpecialCommand::Model(Some("vendor/Model-X".to_string()))
/// );
/// assert_eq!(parse_special_command("hello").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    match word.as_str() {
        "/new" => Ok(SpecialCommand::NewSession),
        "/sessions" => Ok(SpecialCommand::ListSessions),
        "/switch" => required(rest, "/switch", "/switch <session-id>")
            .map(SpecialCommand::SwitchSession),
        "/rename" => required(rest, "/rename", "/rename <title>").map(SpecialCommand::Rename),
        "/delete" => {
            required(rest, "/delete", "/delete <session-id>").map(SpecialCommand::DeleteSession)
        }
        "/system" if rest == "--clear" => Ok(SpecialCommand::SystemPrompt(Some(String::new()))),
        "/system" => Ok(SpecialCommand::SystemPrompt(optional(rest))),
        "/model" => Ok(SpecialCommand::Model(optional(rest))),
        "/models" => Ok(SpecialCommand::ListModels),
        "/regenerate" | "/retry" => Ok(SpecialCommand::Regenerate),
        "/edit" => required(rest, "/edit", "/edit <new message>").map(SpecialCommand::EditLast),
        "/clear" => Ok(SpecialCommand::Clear),
        "/export" => parse_export(rest),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

fn required(rest: &str, command: &str, usage: &str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(rest.to_string())
    }
}

fn optional(rest: &str) -> Option<String> {
    (!rest.is_empty()).then(|| rest.to_string())
}

fn parse_export(rest: &str) -> Result<SpecialCommand, CommandError> {
    let mut path = None;
    let mut markdown = false;
    for arg in rest.split_whitespace() {
        match arg {
            "--markdown" | "--md" => markdown = true,
            flag if flag.starts_with("--") => {
                return Err(CommandError::UnsupportedArgument {
                    command: "/export".to_string(),
                    arg: flag.to_string(),
                })
            }
            value if path.is_none() => path = Some(PathBuf::from(value)),
            extra => {
                return Err(CommandError::UnsupportedArgument {
                    command: "/export".to_string(),
                    arg: extra.to_string(),
                })
            }
        }
    }

    match path {
        Some(path) => Ok(SpecialCommand::Export { path, markdown }),
        None => Err(CommandError::MissingArgument {
            command: "/export".to_string(),
            usage: "/export <path> [--markdown]".to_string(),
        }),
    }
}

/// Print the interactive help text
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

SESSIONS:
  /new                  - Start a new session
  /sessions             - List sessions
  /switch <id>          - Switch to another session
  /rename <title>       - Rename the current session
  /delete <id>          - Delete a session

CONVERSATION:
  /system [text]        - Show or set the system prompt
  /system --clear       - Remove the system prompt
  /regenerate           - Ask again for the last message
  /edit <text>          - Replace the last message and ask again
  /clear                - Clear the current session
  /export <path> [--markdown] - Export the current session

MODELS:
  /model [id]           - Show or select the model
  /models               - List available models

OTHER:
  /help                 - Show this help
  /exit                 - Leave (Ctrl-D also works)

Press Ctrl-C while a reply is streaming to stop it.
"#
    );
}
