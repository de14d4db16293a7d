use crate::context::ExecutionContext;
use anyhow::{Context, Result};
use is_terminal::IsTerminal;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use winstrument_runtime::{ReplayEngine, RunOutcome, Runtime, RuntimeConfig};

pub fn handle(
    ctx: &ExecutionContext,
    target: Option<String>,
    args: Vec<String>,
    probes: Vec<String>,
    all_probes: bool,
    replay: Option<PathBuf>,
) -> Result<()> {
    let Some(recording) = replay else {
        anyhow::bail!(
            "No live instrumentation engine is available in this build; pass --replay <recording.json>"
        );
    };

    let engine = ReplayEngine::from_file(&recording)
        .with_context(|| format!("Failed to load recording {}", recording.display()))?;
    let config = RuntimeConfig::from_data_dir(ctx.data_dir())?;
    let mut runtime = Runtime::new(engine, config)?;

    let requested = if all_probes {
        runtime.available_probes().to_vec()
    } else {
        probes
    };
    for name in &requested {
        runtime.load_probe(name);
    }
    if runtime.loaded_probes().is_empty() {
        tracing::warn!("no probes loaded, the target will run uninstrumented");
    }

    let handle = runtime.handle();
    ctrlc::set_handler(move || handle.stop()).context("Failed to install Ctrl-C handler")?;

    // An explicit target never falls back to the stored arguments
    let args = if target.is_some() || !args.is_empty() {
        Some(args)
    } else {
        None
    };

    let outcome = runtime.run(target.as_deref(), args)?;
    if outcome == RunOutcome::Cancelled {
        eprintln!("Run cancelled");
    }

    for probe in runtime.loaded_probes() {
        let count = runtime.read_messages(probe)?.len();
        println!("{:<12} {} messages", probe, count);
    }

    let kept = runtime.quit(confirm_keep)?;
    if !kept {
        println!("Stored output discarded");
    }
    Ok(())
}

/// Ask on an interactive terminal; keep output otherwise.
fn confirm_keep() -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return true;
    }

    print!("Save stored output in DB [Y]/n? ");
    let _ = io::stdout().flush();

    let mut answer = String::new();
    if stdin.lock().read_line(&mut answer).is_err() {
        return true;
    }
    matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes")
}
