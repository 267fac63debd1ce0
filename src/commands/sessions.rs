//! Session management commands

use chrono::{Local, TimeZone};
use colored::Colorize;
use prettytable::{format, Table};

use super::AppContext;
use crate::cli::SessionCommand;
use crate::error::Result;
use crate::sessions::SessionRegistry;

/// Handle `polychat sessions ...`
pub fn handle_sessions(ctx: &AppContext, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::List => print_sessions(&ctx.registry)?,
        SessionCommand::New => {
            let session = ctx.registry.create()?;
            println!("{}", format!("Created session {}", session.id).green());
        }
        SessionCommand::Select { id } => {
            ctx.registry.select(&id)?;
            println!("{}", format!("Active session is now {}", id).green());
        }
        SessionCommand::Rename { id, title } => {
            let session = ctx.registry.rename(&id, &title)?;
            println!("{}", format!("Renamed {} to \"{}\"", id, session.title).green());
        }
        SessionCommand::Delete { id } => {
            if ctx.registry.delete(&id)? {
                println!("{}", format!("Deleted session {}", id).green());
            } else {
                println!("{}", format!("No session with id {}", id).yellow());
            }
        }
    }
    Ok(())
}

/// Print the session table, marking the active session
pub fn print_sessions(registry: &SessionRegistry) -> Result<()> {
    let sessions = registry.list()?;
    if sessions.is_empty() {
        println!("{}", "No sessions yet.".yellow());
        return Ok(());
    }

    let active = registry.active_id()?;
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "".bold(),
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Created".bold()
    ]);

    for session in sessions {
        let marker = if active.as_deref() == Some(session.id.as_str()) {
            "*"
        } else {
            ""
        };
        let created = Local
            .timestamp_millis_opt(session.created_at)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let count = registry.messages(&session.id)?.len();

        table.add_row(prettytable::row![
            marker.green(),
            session.id.cyan(),
            session.title,
            count,
            created
        ]);
    }

    println!();
    table.printstd();
    println!();
    Ok(())
}
