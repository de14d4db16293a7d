use crate::types::{LogLevel, OutputFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "winstrument")]
#[command(about = "Spawn Windows processes under instrumentation probes and inspect what they did", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Data directory (defaults to WINSTRUMENT_PATH or the platform data dir)
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    #[arg(long, default_value = "info", global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Spawn the target and instrument it and its children until they exit")]
    Run {
        /// Executable to spawn (defaults to the `core.target` setting)
        target: Option<String>,

        /// Arguments passed to the target (after `--` when they start with `-`)
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,

        #[arg(long = "probe", short = 'p', help = "Probe to load (repeatable)")]
        probes: Vec<String>,

        #[arg(long, help = "Load every available probe", conflicts_with = "probes")]
        all_probes: bool,

        #[arg(long, help = "Drive the session from a recorded capture")]
        replay: Option<PathBuf>,
    },

    #[command(about = "List probes and whether they can be loaded")]
    Probes,

    #[command(about = "Describe one probe, or all of them")]
    Info { probe: Option<String> },

    #[command(about = "Print stored output of a probe")]
    Show {
        probe: String,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    #[command(about = "Write stored output of a probe to a file")]
    Export {
        probe: String,

        file: PathBuf,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    #[command(about = "Write stored output of every probe to a file")]
    ExportAll {
        file: PathBuf,

        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },

    #[command(about = "Read or change settings")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    #[command(about = "Delete all stored probe output")]
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    #[command(about = "Print one setting")]
    Get { namespace: String, key: String },

    #[command(about = "Change one setting")]
    Set {
        namespace: String,
        key: String,
        value: String,
    },

    #[command(about = "Print every setting in a namespace")]
    List {
        #[arg(default_value = "core")]
        namespace: String,
    },
}
