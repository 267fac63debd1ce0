//! Export and import commands

use std::path::{Path, PathBuf};

use colored::Colorize;

use super::AppContext;
use crate::cli::ExportFormat;
use crate::error::{PolychatError, Result};
use crate::sessions::{render_markdown, SessionRegistry};

/// Handle `polychat export`
pub fn handle_export(
    ctx: &AppContext,
    id: Option<String>,
    all: bool,
    format: ExportFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let rendered = if all {
        if format == ExportFormat::Markdown {
            return Err(PolychatError::Validation(
                "Markdown export covers a single session; drop --all or use --format json"
                    .to_string(),
            )
            .into());
        }
        ctx.registry.export_all()?.to_json_pretty()?
    } else {
        let id = match id {
            Some(id) => id,
            None => ctx
                .registry
                .active_id()?
                .ok_or_else(|| PolychatError::Validation("No active session".to_string()))?,
        };
        render_session(&ctx.registry, &id, format)?
    };

    match output {
        Some(path) => {
            write_output(&path, &rendered)?;
            eprintln!("{}", format!("Exported to {}", path.display()).green());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

/// Render one session in the requested format
pub fn render_session(registry: &SessionRegistry, id: &str, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => registry.export_bundle(id)?.to_json_pretty(),
        ExportFormat::Markdown => Ok(render_markdown(&registry.export(id)?)),
    }
}

/// Write rendered export text, creating parent directories
pub fn write_output(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    tracing::info!("Wrote export to {}", path.display());
    Ok(())
}

/// Handle `polychat import <path>`
pub fn handle_import(ctx: &AppContext, path: &Path) -> Result<usize> {
    let raw = std::fs::read_to_string(path)?;
    let payload: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|e| PolychatError::Import(format!("{} is not valid JSON: {}", path.display(), e)))?;
    let count = ctx.registry.import(&payload)?;
    println!(
        "{}",
        format!("Imported {} chat{}", count, if count == 1 { "" } else { "s" }).green()
    );
    Ok(count)
}
