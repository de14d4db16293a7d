use anyhow::Result;
use is_terminal::IsTerminal;
use std::path::{Path, PathBuf};
use winstrument_index::Database;
use winstrument_probes::ProbeCatalog;
use winstrument_runtime::{Config, ProbeRegistry, Settings};

/// Paths and stores shared by every command.
pub struct ExecutionContext {
    data_dir: PathBuf,
    config: Config,
}

impl ExecutionContext {
    pub fn new(data_dir: PathBuf) -> Result<Self> {
        let config = Config::load_from(&Config::path_in(&data_dir))?;
        Ok(Self { data_dir, config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn db(&self) -> Result<Database> {
        Ok(Database::open(&self.config.database_path(&self.data_dir))?)
    }

    pub fn registry(&self) -> ProbeRegistry {
        ProbeRegistry::from_metadata(
            ProbeCatalog::builtin(),
            &self.config.metadata_path(&self.data_dir),
        )
    }

    pub fn settings(&self, db: &Database) -> Settings {
        Settings::restore(db)
    }

    /// Colors only when stdout is a terminal.
    pub fn color(&self) -> bool {
        std::io::stdout().is_terminal()
    }
}
