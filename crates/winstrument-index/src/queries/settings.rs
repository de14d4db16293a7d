use rusqlite::{Connection, OptionalExtension, params};

use crate::Result;
use crate::db::Namespace;

pub fn upsert(conn: &Connection, namespace: &str, settings: &Namespace) -> Result<()> {
    let json = serde_json::to_string(settings)?;
    conn.execute(
        r#"
        INSERT INTO settings (namespace, settings_json)
        VALUES (?1, ?2)
        ON CONFLICT(namespace) DO UPDATE SET
            settings_json = ?2
        "#,
        params![namespace, json],
    )?;

    Ok(())
}

pub fn get(conn: &Connection, namespace: &str) -> Result<Option<Namespace>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT settings_json FROM settings WHERE namespace = ?1",
            [namespace],
            |row| row.get(0),
        )
        .optional()?;

    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub fn list_namespaces(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT namespace FROM settings ORDER BY namespace")?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;

    Ok(names)
}
