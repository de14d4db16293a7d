use super::args::{Cli, Commands, ConfigCommand};
use super::context::ExecutionContext;
use super::handlers;
use crate::types::LogLevel;
use anyhow::Result;
use tracing_subscriber::EnvFilter;
use winstrument_runtime::resolve_data_dir;

pub fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log_level);

    let data_dir = resolve_data_dir(cli.data_dir.as_deref())?;
    let ctx = ExecutionContext::new(data_dir)?;

    match cli.command {
        Commands::Run {
            target,
            args,
            probes,
            all_probes,
            replay,
        } => handlers::run::handle(&ctx, target, args, probes, all_probes, replay),

        Commands::Probes => handlers::probes::handle_list(&ctx),

        Commands::Info { probe } => handlers::probes::handle_info(&ctx, probe.as_deref()),

        Commands::Show { probe, format } => handlers::output::handle_show(&ctx, &probe, format),

        Commands::Export {
            probe,
            file,
            format,
        } => handlers::output::handle_export(&ctx, &probe, &file, format),

        Commands::ExportAll { file, format } => {
            handlers::output::handle_export_all(&ctx, &file, format)
        }

        Commands::Config { command } => match command {
            ConfigCommand::Get { namespace, key } => {
                handlers::config::handle_get(&ctx, &namespace, &key)
            }
            ConfigCommand::Set {
                namespace,
                key,
                value,
            } => handlers::config::handle_set(&ctx, &namespace, &key, value),
            ConfigCommand::List { namespace } => handlers::config::handle_list(&ctx, &namespace),
        },

        Commands::Clear => handlers::output::handle_clear(&ctx),
    }
}

/// `RUST_LOG` wins over `--log-level`. Probe output printed on detach is
/// always shown.
fn init_logging(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},winstrument::output=info", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
