use std::collections::BTreeMap;
use winstrument_index::{Database, Namespace};

use crate::Result;

/// Reserved namespace for orchestrator settings.
pub const CORE_NAMESPACE: &str = "core";

pub const DEFAULT_TARGET: &str = "C:\\Windows\\System32\\Notepad.exe";

static EMPTY: Namespace = BTreeMap::new();

/// Namespaced key/value settings, one namespace per probe plus `core`.
///
/// Owned by the orchestrator and persisted only on explicit `save`.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    namespaces: BTreeMap<String, Namespace>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut settings = Self {
            namespaces: BTreeMap::new(),
        };
        settings.set(CORE_NAMESPACE, "target", DEFAULT_TARGET);
        settings.set(CORE_NAMESPACE, "verbosity", "0");
        settings
    }
}

impl Settings {
    /// Defaults overlaid with every namespace stored in `db`.
    ///
    /// A store that cannot be read yields the defaults.
    pub fn restore(db: &Database) -> Self {
        let mut settings = Self::default();

        let namespaces = match db.settings_namespaces() {
            Ok(namespaces) => namespaces,
            Err(err) => {
                tracing::warn!(error = %err, "could not read stored settings, using defaults");
                return settings;
            }
        };

        for name in namespaces {
            match db.restore_settings(&name) {
                Ok(Some(stored)) => {
                    let entry = settings.namespaces.entry(name).or_default();
                    entry.extend(stored);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(namespace = %name, error = %err, "skipping unreadable settings");
                }
            }
        }
        settings
    }

    pub fn save(&self, db: &Database) -> Result<()> {
        for (name, values) in &self.namespaces {
            db.save_settings(name, values)?;
        }
        Ok(())
    }

    pub fn get(&self, namespace: &str, key: &str) -> Option<&str> {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.get(key))
            .map(String::as_str)
    }

    pub fn set(&mut self, namespace: &str, key: &str, value: impl Into<String>) {
        self.namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn get_int(&self, namespace: &str, key: &str) -> Option<i64> {
        self.get(namespace, key)?.trim().parse().ok()
    }

    /// `yes`/`true` and `no`/`false`, case-insensitive.
    pub fn get_bool(&self, namespace: &str, key: &str) -> Option<bool> {
        match self.get(namespace, key)?.trim().to_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        }
    }

    /// Borrow a namespace; unknown namespaces read as empty.
    pub fn namespace(&self, namespace: &str) -> &Namespace {
        self.namespaces.get(namespace).unwrap_or(&EMPTY)
    }

    pub fn get_all(&self, namespace: &str) -> Namespace {
        self.namespace(namespace).clone()
    }

    pub fn set_all(&mut self, namespace: &str, values: Namespace) {
        self.namespaces.insert(namespace.to_string(), values);
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }

    pub fn verbosity(&self) -> i64 {
        self.get_int(CORE_NAMESPACE, "verbosity").unwrap_or(0)
    }
}
