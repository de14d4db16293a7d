use crate::context::ExecutionContext;
use crate::presentation::format_messages;
use crate::types::OutputFormat;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

pub fn handle_show(ctx: &ExecutionContext, probe: &str, format: OutputFormat) -> Result<()> {
    let db = ctx.db()?;
    let verbosity = ctx.settings(&db).verbosity();

    let messages = db.read_messages(&probe.to_lowercase())?;
    if messages.is_empty() {
        eprintln!("No stored output for {}", probe);
        return Ok(());
    }

    println!("{}", format_messages(format, &messages, verbosity, ctx.color())?);
    Ok(())
}

pub fn handle_export(
    ctx: &ExecutionContext,
    probe: &str,
    file: &Path,
    format: OutputFormat,
) -> Result<()> {
    let db = ctx.db()?;
    let verbosity = ctx.settings(&db).verbosity();

    let messages = db.read_messages(&probe.to_lowercase())?;
    let mut content = format_messages(format, &messages, verbosity, false)?;
    content.push('\n');

    fs::write(file, content).with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Exported {} messages to {}", messages.len(), file.display());
    Ok(())
}

/// Every probe that has stored output, one block per probe.
pub fn handle_export_all(ctx: &ExecutionContext, file: &Path, format: OutputFormat) -> Result<()> {
    let db = ctx.db()?;
    let verbosity = ctx.settings(&db).verbosity();

    let mut content = String::new();
    let mut total = 0;
    for probe in db.probes_with_output()? {
        let messages = db.read_messages(&probe)?;
        total += messages.len();
        content.push_str(&format_messages(format, &messages, verbosity, false)?);
        content.push('\n');
    }

    fs::write(file, content).with_context(|| format!("Failed to write {}", file.display()))?;
    println!("Exported {} messages to {}", total, file.display());
    Ok(())
}

pub fn handle_clear(ctx: &ExecutionContext) -> Result<()> {
    let db = ctx.db()?;
    let cleared = db.clear_messages()?;
    println!("Cleared {} messages", cleared);
    Ok(())
}
