//! Command-line interface definition for PolyChat
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chatting, session management, import/export,
//! settings and the model list.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// PolyChat - multi-session streaming chat client
///
/// Talks to an OpenAI-compatible chat completions endpoint and keeps every
/// conversation in a local database.
#[derive(Parser, Debug, Clone)]
#[command(name = "polychat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Database path (overrides config and POLYCHAT_DB)
    #[arg(long, global = true)]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for PolyChat
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start an interactive chat
    Chat {
        /// Session to open (defaults to the active session)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Send one prompt and stream the reply
    Ask {
        /// Prompt text
        prompt: String,

        /// Session to append to (defaults to the active session)
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage chat sessions
    Sessions {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Export sessions to JSON or Markdown
    Export {
        /// Session to export (defaults to the active session)
        id: Option<String>,

        /// Export every session
        #[arg(long, conflicts_with = "id")]
        all: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import sessions from an export file
    Import {
        /// Path to a JSON export
        path: PathBuf,
    },

    /// Show or change settings
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Manage the model list
    Models {
        /// Model subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List sessions, newest first
    List,
    /// Create a session and make it active
    New,
    /// Make a session active
    Select {
        /// Session id
        id: String,
    },
    /// Rename a session
    Rename {
        /// Session id
        id: String,
        /// New title
        title: String,
    },
    /// Delete a session and its messages
    Delete {
        /// Session id
        id: String,
    },
}

/// Settings subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Show current settings
    Show,
    /// Store the API key
    SetKey {
        /// API key
        key: String,
    },
    /// Remove the stored API key
    ClearKey,
    /// Select the model used for new requests
    SetModel {
        /// Model id
        model: String,
    },
    /// Set the default cost per 1000 tokens (USD)
    SetCost {
        /// Cost per 1000 tokens
        cost: f64,
    },
    /// Remove the default cost per 1000 tokens
    ClearCost,
    /// Show or set a session's system prompt
    System {
        /// Session id
        id: String,
        /// New system prompt; empty clears it, omitted shows it
        text: Option<String>,
    },
}

/// Model subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List built-in and custom models
    List,
    /// Add a custom model
    Add {
        /// Model id
        id: String,
    },
    /// Remove a custom model
    Remove {
        /// Model id
        id: String,
    },
}

/// Export output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Portable JSON bundle
    Json,
    /// Markdown transcript (single session)
    Markdown,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_chat_command() {
        let cli = Cli::try_parse_from(["polychat", "chat"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { session: None }));
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_chat_with_session() {
        let cli = Cli::try_parse_from(["polychat", "chat", "--session", "abc"]).unwrap();
        if let Commands::Chat { session } = cli.command {
            assert_eq!(session, Some("abc".to_string()));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_ask() {
        let cli = Cli::try_parse_from(["polychat", "ask", "Hello there"]).unwrap();
        if let Commands::Ask { prompt, session } = cli.command {
            assert_eq!(prompt, "Hello there");
            assert!(session.is_none());
        } else {
            panic!("Expected Ask command");
        }
    }

    #[test]
    fn test_cli_parse_global_storage_path() {
        let cli =
            Cli::try_parse_from(["polychat", "sessions", "list", "--storage-path", "/tmp/x"])
                .unwrap();
        assert_eq!(cli.storage_path, Some("/tmp/x".to_string()));
        assert!(matches!(
            cli.command,
            Commands::Sessions {
                command: SessionCommand::List
            }
        ));
    }

    #[test]
    fn test_cli_parse_sessions_rename() {
        let cli = Cli::try_parse_from(["polychat", "sessions", "rename", "id1", "New name"]).unwrap();
        if let Commands::Sessions {
            command: SessionCommand::Rename { id, title },
        } = cli.command
        {
            assert_eq!(id, "id1");
            assert_eq!(title, "New name");
        } else {
            panic!("Expected sessions rename");
        }
    }

    #[test]
    fn test_cli_parse_export_defaults() {
        let cli = Cli::try_parse_from(["polychat", "export"]).unwrap();
        if let Commands::Export {
            id,
            all,
            format,
            output,
        } = cli.command
        {
            assert!(id.is_none());
            assert!(!all);
            assert_eq!(format, ExportFormat::Json);
            assert!(output.is_none());
        } else {
            panic!("Expected Export command");
        }
    }

    #[test]
    fn test_cli_parse_export_markdown() {
        let cli = Cli::try_parse_from([
            "polychat", "export", "abc", "--format", "markdown", "-o", "out.md",
        ])
        .unwrap();
        if let Commands::Export {
            id, format, output, ..
        } = cli.command
        {
            assert_eq!(id, Some("abc".to_string()));
            assert_eq!(format, ExportFormat::Markdown);
            assert_eq!(output, Some(PathBuf::from("out.md")));
        } else {
            panic!("Expected Export command");
        }
    }

    #[test]
    fn test_cli_export_all_conflicts_with_id() {
        assert!(Cli::try_parse_from(["polychat", "export", "abc", "--all"]).is_err());
    }

    #[test]
    fn test_cli_parse_settings_set_cost() {
        let cli = Cli::try_parse_from(["polychat", "settings", "set-cost", "0.5"]).unwrap();
        if let Commands::Settings {
            command: SettingsCommand::SetCost { cost },
        } = cli.command
        {
            assert!((cost - 0.5).abs() < f64::EPSILON);
        } else {
            panic!("Expected settings set-cost");
        }
    }

    #[test]
    fn test_cli_parse_settings_system_without_text() {
        let cli = Cli::try_parse_from(["polychat", "settings", "system", "abc"]).unwrap();
        if let Commands::Settings {
            command: SettingsCommand::System { id, text },
        } = cli.command
        {
            assert_eq!(id, "abc");
            assert!(text.is_none());
        } else {
            panic!("Expected settings system");
        }
    }

    #[test]
    fn test_cli_parse_models_add() {
        let cli = Cli::try_parse_from(["polychat", "models", "add", "vendor/model"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Models {
                command: ModelCommand::Add { .. }
            }
        ));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["polychat"]).is_err());
    }
}
