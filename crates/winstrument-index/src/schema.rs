use rusqlite::Connection;

use crate::Result;

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

// NOTE: Store layout
//
// messages: one row per probe event, rowid order is insertion order.
//   Payload is kept as a JSON text blob; the store never looks inside it.
// settings: one row per namespace (probe name or "core"), the whole
//   namespace serialized as a JSON object.

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if current_version != 0 && current_version != SCHEMA_VERSION {
        tracing::warn!(
            found = current_version,
            expected = SCHEMA_VERSION,
            "store schema version mismatch, recreating tables"
        );
        drop_all_tables(conn)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            probe TEXT NOT NULL,
            time TEXT NOT NULL,
            target TEXT NOT NULL,
            payload TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS settings (
            namespace TEXT PRIMARY KEY,
            settings_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_probe ON messages(probe, id);
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS messages;
        DROP TABLE IF EXISTS settings;
        "#,
    )?;
    Ok(())
}
