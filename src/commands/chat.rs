//! Interactive chat REPL and one-shot `ask`
//!
//! Both front ends drive a [`ConversationStore`] and print reply text as it
//! streams. Pressing Ctrl-C while a reply streams cancels that reply; the
//! REPL keeps running.

use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::special_commands::{parse_special_command, print_help, SpecialCommand};
use super::{models, sessions, transfer, AppContext};
use crate::chat::store::EMPTY_REPLY_PLACEHOLDER;
use crate::chat::{ConversationStore, TurnOutcome};
use crate::cli::ExportFormat;
use crate::error::Result;
use crate::pricing::meta_label;

/// One streamed request against the open session
#[derive(Debug, Clone, Copy)]
enum Turn<'a> {
    Send(&'a str),
    Regenerate,
    Edit(&'a str),
}

/// Start the interactive chat loop
///
/// # Arguments
///
/// * `ctx` - Opened application context
/// * `session` - Session id to open; defaults to the active session
///
/// # Errors
///
/// Returns error if the session cannot be resolved or the line editor
/// cannot be created. Errors from individual commands are printed and the
/// loop continues.
pub async fn run_chat(ctx: &AppContext, session: Option<String>) -> Result<()> {
    let session = ctx.resolve_session(session.as_deref())?;
    let mut store = open_store(ctx, &session.id)?;
    let mut rl = DefaultEditor::new()?;

    print_welcome(ctx, &store)?;

    loop {
        let title = ctx
            .registry
            .get(store.session_id())?
            .map(|s| s.title)
            .unwrap_or_default();
        let prompt = format!("[{}] > ", title.cyan());

        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                let command = match parse_special_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}", e.to_string().red());
                        continue;
                    }
                };

                match command {
                    SpecialCommand::Exit => break,
                    SpecialCommand::None => {
                        if let Err(e) = run_turn(ctx, &store, Turn::Send(trimmed)).await {
                            eprintln!("{}", format!("Error: {}", e).red());
                        }
                    }
                    other => match dispatch(ctx, &mut store, other).await {
                        Ok(()) => {}
                        Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "Use /exit or Ctrl-D to leave".yellow());
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Send one prompt, stream the reply to stdout, and return
///
/// # Errors
///
/// Returns error for a blank prompt, a missing API key, or a failed
/// request.
pub async fn run_ask(ctx: &AppContext, prompt: &str, session: Option<String>) -> Result<()> {
    let session = ctx.resolve_session(session.as_deref())?;
    let store = open_store(ctx, &session.id)?;

    match stream_turn(&store, Turn::Send(prompt)).await? {
        TurnOutcome::Failed(message) => {
            println!();
            Err(anyhow::anyhow!(message.content))
        }
        outcome => {
            report_outcome(ctx, &outcome)?;
            Ok(())
        }
    }
}

fn open_store(ctx: &AppContext, session_id: &str) -> Result<ConversationStore> {
    ConversationStore::open(
        ctx.registry.clone(),
        ctx.settings.clone(),
        ctx.engine.clone(),
        session_id,
    )
}

fn print_welcome(ctx: &AppContext, store: &ConversationStore) -> Result<()> {
    println!("{}", "PolyModel Chat".bold());
    println!(
        "Model: {}   Session: {}",
        ctx.settings.selected_model()?.cyan(),
        store.session_id()
    );
    println!("Type /help for commands.\n");

    for message in store.messages() {
        println!("{}: {}", message.role.as_str().bold(), message.content);
    }
    Ok(())
}

async fn dispatch(
    ctx: &AppContext,
    store: &mut ConversationStore,
    command: SpecialCommand,
) -> Result<()> {
    match command {
        SpecialCommand::NewSession => {
            let session = ctx.registry.create()?;
            *store = open_store(ctx, &session.id)?;
            println!("{}", format!("Started session {}", session.id).green());
        }
        SpecialCommand::ListSessions => sessions::print_sessions(&ctx.registry)?,
        SpecialCommand::SwitchSession(id) => {
            let next = open_store(ctx, &id)?;
            ctx.registry.select(&id)?;
            *store = next;
            print_welcome(ctx, store)?;
        }
        SpecialCommand::Rename(title) => {
            let session = ctx.registry.rename(store.session_id(), &title)?;
            println!("{}", format!("Renamed to \"{}\"", session.title).green());
        }
        SpecialCommand::DeleteSession(id) => {
            if !ctx.registry.delete(&id)? {
                println!("{}", format!("No session with id {}", id).yellow());
                return Ok(());
            }
            println!("{}", format!("Deleted session {}", id).green());
            if id == store.session_id() {
                store.cancel();
                let session = ctx.resolve_session(None)?;
                *store = open_store(ctx, &session.id)?;
                println!("Now in session {}", session.id);
            }
        }
        SpecialCommand::SystemPrompt(None) => {
            let prompt = store.system_prompt()?;
            if prompt.is_empty() {
                println!("{}", "No system prompt".yellow());
            } else {
                println!("{}", prompt);
            }
        }
        SpecialCommand::SystemPrompt(Some(text)) => {
            store.set_system_prompt(&text)?;
            if text.is_empty() {
                println!("{}", "System prompt cleared".green());
            } else {
                println!("{}", "System prompt saved".green());
            }
        }
        SpecialCommand::Model(None) => {
            println!("Model: {}", ctx.settings.selected_model()?.cyan());
        }
        SpecialCommand::Model(Some(model)) => {
            ctx.settings.set_selected_model(&model)?;
            println!("{}", format!("Model set to {}", model).green());
        }
        SpecialCommand::ListModels => models::print_models(&ctx.settings)?,
        SpecialCommand::Regenerate => run_turn(ctx, store, Turn::Regenerate).await?,
        SpecialCommand::EditLast(text) => run_turn(ctx, store, Turn::Edit(&text)).await?,
        SpecialCommand::Clear => {
            store.clear()?;
            println!("{}", "Session cleared".green());
        }
        SpecialCommand::Export { path, markdown } => {
            let format = if markdown {
                ExportFormat::Markdown
            } else {
                ExportFormat::Json
            };
            let rendered = transfer::render_session(&ctx.registry, store.session_id(), format)?;
            transfer::write_output(&path, &rendered)?;
            println!("{}", format!("Exported to {}", path.display()).green());
        }
        SpecialCommand::Help => print_help(),
        SpecialCommand::Exit | SpecialCommand::None => {}
    }
    Ok(())
}

async fn run_turn(ctx: &AppContext, store: &ConversationStore, turn: Turn<'_>) -> Result<()> {
    let outcome = stream_turn(store, turn).await?;
    report_outcome(ctx, &outcome)
}

/// Drive one turn, printing deltas and cancelling on Ctrl-C
async fn stream_turn(store: &ConversationStore, turn: Turn<'_>) -> Result<TurnOutcome> {
    let mut print_delta = |delta: &str| {
        print!("{}", delta);
        let _ = std::io::stdout().flush();
    };

    let fut = async {
        match turn {
            Turn::Send(text) => store.send(text, &mut print_delta).await,
            Turn::Regenerate => store.regenerate(&mut print_delta).await,
            Turn::Edit(text) => store.edit_last(text, &mut print_delta).await,
        }
    };
    tokio::pin!(fut);

    loop {
        tokio::select! {
            outcome = &mut fut => return outcome,
            _ = tokio::signal::ctrl_c() => {
                tracing::debug!("Interrupt received, cancelling reply");
                store.cancel();
            }
        }
    }
}

fn report_outcome(ctx: &AppContext, outcome: &TurnOutcome) -> Result<()> {
    match outcome {
        TurnOutcome::Completed(message) => {
            if message.content == EMPTY_REPLY_PLACEHOLDER {
                print!("{}", message.content.yellow());
            }
            println!();
            if let Some(label) = meta_label(message, ctx.settings.cost_per_1k()?) {
                println!("{}", label.dimmed());
            }
            println!();
        }
        TurnOutcome::Failed(message) => {
            println!();
            eprintln!("{}\n", format!("Error: {}", message.content).red());
        }
        TurnOutcome::Aborted { .. } => {
            println!("\n{}\n", "[stopped]".yellow());
        }
        TurnOutcome::NoUserMessage => {
            println!("{}", "Nothing to regenerate".yellow());
        }
    }
    Ok(())
}
