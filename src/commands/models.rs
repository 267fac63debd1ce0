//! Model list commands

use colored::Colorize;
use prettytable::{format, Table};

use super::AppContext;
use crate::cli::ModelCommand;
use crate::error::Result;
use crate::pricing::is_free_model;
use crate::settings::{Settings, MODELS};

/// Handle `polychat models ...`
pub fn handle_models(ctx: &AppContext, command: ModelCommand) -> Result<()> {
    match command {
        ModelCommand::List => print_models(&ctx.settings)?,
        ModelCommand::Add { id } => {
            if ctx.settings.add_custom_model(&id)? {
                println!("{}", format!("Added model {}", id.trim()).green());
            } else {
                println!(
                    "{}",
                    format!("Model {} is empty or already listed", id.trim()).yellow()
                );
            }
        }
        ModelCommand::Remove { id } => {
            if ctx.settings.remove_custom_model(&id)? {
                println!("{}", format!("Removed model {}", id).green());
            } else {
                println!("{}", format!("No custom model {}", id).yellow());
            }
        }
    }
    Ok(())
}

/// Print built-in and custom models, marking the selected one
pub fn print_models(settings: &Settings) -> Result<()> {
    let selected = settings.selected_model()?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "".bold(),
        "Model".bold(),
        "Source".bold(),
        "Pricing".bold()
    ]);

    for model in settings.all_models()? {
        let marker = if model == selected { "*" } else { "" };
        let source = if MODELS.contains(&model.as_str()) {
            "built-in"
        } else {
            "custom"
        };
        let pricing = if is_free_model(&model) { "free" } else { "-" };
        table.add_row(prettytable::row![marker.green(), model.cyan(), source, pricing]);
    }

    println!();
    table.printstd();
    println!();
    Ok(())
}
