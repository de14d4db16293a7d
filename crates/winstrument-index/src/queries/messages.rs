use rusqlite::{Connection, params};
use winstrument_types::{Message, Payload};

use crate::{Error, Result};

pub fn insert(conn: &Connection, message: &Message) -> Result<i64> {
    let payload = serde_json::to_string(&message.payload)?;
    conn.execute(
        r#"
        INSERT INTO messages (probe, time, target, payload)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![&message.probe, &message.time, &message.target, payload],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn list_by_probe(conn: &Connection, probe: &str) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT probe, time, target, payload
        FROM messages
        WHERE probe = ?1
        ORDER BY id ASC
        "#,
    )?;

    let rows = stmt
        .query_map([probe], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

    rows.into_iter()
        .map(|(probe, time, target, payload)| {
            let payload = decode_payload(&payload)?;
            Ok(Message {
                probe,
                time,
                target,
                payload,
            })
        })
        .collect()
}

pub fn count_by_probe(conn: &Connection, probe: &str) -> Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM messages WHERE probe = ?1",
        [probe],
        |row| row.get(0),
    )?;

    Ok(count as usize)
}

/// Probe names that have stored output, in order of first appearance.
pub fn probes(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT probe
        FROM messages
        GROUP BY probe
        ORDER BY MIN(id) ASC
        "#,
    )?;

    let probes = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, rusqlite::Error>>()?;

    Ok(probes)
}

pub fn clear(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM messages", [])?;
    Ok(removed)
}

fn decode_payload(raw: &str) -> Result<Payload> {
    match serde_json::from_str(raw)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::Query(format!(
            "stored payload is not an object: {}",
            other
        ))),
    }
}
