use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolve the data directory based on priority:
/// 1. Explicit path (with tilde expansion)
/// 2. WINSTRUMENT_PATH environment variable (with tilde expansion)
/// 3. Platform data directory
/// 4. ~/.winstrument
pub fn resolve_data_dir(explicit_path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(expand_tilde(path));
    }

    if let Ok(env_path) = std::env::var("WINSTRUMENT_PATH") {
        return Ok(expand_tilde(&env_path));
    }

    if let Some(data_dir) = dirs::data_dir() {
        return Ok(data_dir.join("winstrument"));
    }

    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".winstrument"));
    }

    Err(Error::Config(
        "Could not determine data directory: no home or platform data directory found".to_string(),
    ))
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    PathBuf::from(path)
}

fn default_database() -> String {
    "winstrument.db".to_string()
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_metadata() -> String {
    "probes.toml".to_string()
}

/// Contents of `config.toml` in the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Store file name, relative to the data directory
    #[serde(default = "default_database")]
    pub database: String,

    /// Bound on pending cross-thread reactor work
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Probe descriptor file, relative to the data directory
    #[serde(default = "default_metadata")]
    pub metadata: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: default_database(),
            queue_capacity: default_queue_capacity(),
            metadata: default_metadata(),
        }
    }
}

impl Config {
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join("config.toml")
    }

    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.database)
    }

    pub fn metadata_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database, "winstrument.db");
        assert_eq!(config.queue_capacity, 1024);
    }

    #[test]
    fn test_missing_file_is_default() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config = Config::load_from(&temp_dir.path().join("config.toml"))?;

        assert_eq!(config, Config::default());
        Ok(())
    }

    #[test]
    fn test_config_save_and_load() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = Config::path_in(temp_dir.path());

        let config = Config {
            database: "capture.db".to_string(),
            queue_capacity: 64,
            ..Config::default()
        };
        config.save_to(&config_path)?;

        let loaded = Config::load_from(&config_path)?;
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.database_path(temp_dir.path()),
            temp_dir.path().join("capture.db")
        );
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = Config::path_in(temp_dir.path());
        std::fs::write(&config_path, "queue_capacity = 8\n")?;

        let loaded = Config::load_from(&config_path)?;
        assert_eq!(loaded.queue_capacity, 8);
        assert_eq!(loaded.database, "winstrument.db");
        Ok(())
    }

    #[test]
    fn test_zero_capacity_is_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = Config::path_in(temp_dir.path());
        std::fs::write(&config_path, "queue_capacity = 0\n")?;

        assert!(matches!(
            Config::load_from(&config_path),
            Err(Error::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn test_explicit_path_wins() -> Result<()> {
        let path = resolve_data_dir(Some("/tmp/winstrument-data"))?;
        assert_eq!(path, PathBuf::from("/tmp/winstrument-data"));
        Ok(())
    }
}
