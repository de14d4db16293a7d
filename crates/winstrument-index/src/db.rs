use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::Path;
use winstrument_types::Message;

use crate::queries;
use crate::{Result, schema};

/// Settings for one namespace: key → string value.
pub type Namespace = BTreeMap<String, String>;

/// Durable store for probe output and namespaced settings.
///
/// Every write is a single autocommit statement, so a message is either
/// fully stored or not stored at all. Callers are expected to serialize
/// access (the orchestrator only touches the store from its loop thread).
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    // Messages

    /// Append one message. Returns its row id.
    pub fn write_message(&self, message: &Message) -> Result<i64> {
        queries::messages::insert(&self.conn, message)
    }

    /// All messages for `probe`, in insertion order.
    pub fn read_messages(&self, probe: &str) -> Result<Vec<Message>> {
        queries::messages::list_by_probe(&self.conn, probe)
    }

    pub fn count_messages(&self, probe: &str) -> Result<usize> {
        queries::messages::count_by_probe(&self.conn, probe)
    }

    pub fn probes_with_output(&self) -> Result<Vec<String>> {
        queries::messages::probes(&self.conn)
    }

    /// Truncate all stored messages. Settings are kept.
    pub fn clear_messages(&self) -> Result<usize> {
        queries::messages::clear(&self.conn)
    }

    // Settings

    pub fn save_settings(&self, namespace: &str, settings: &Namespace) -> Result<()> {
        queries::settings::upsert(&self.conn, namespace, settings)
    }

    pub fn restore_settings(&self, namespace: &str) -> Result<Option<Namespace>> {
        queries::settings::get(&self.conn, namespace)
    }

    pub fn settings_namespaces(&self) -> Result<Vec<String>> {
        queries::settings::list_namespaces(&self.conn)
    }
}
