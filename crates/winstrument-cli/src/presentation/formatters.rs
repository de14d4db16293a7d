use crate::types::OutputFormat;
use anyhow::Result;
use owo_colors::OwoColorize;
use winstrument_types::{Message, Payload, display_value};

/// Render `messages` in `format`.
///
/// Below verbosity 1 the table shortens target paths. `color` only affects
/// the table header.
pub fn format_messages(
    format: OutputFormat,
    messages: &[Message],
    verbosity: i64,
    color: bool,
) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(format_table(messages, verbosity, color)),
        OutputFormat::Json => format_json(messages),
        OutputFormat::Grep => Ok(format_grep(messages)),
    }
}

/// Column-aligned table over the flattened messages. Columns are the union
/// of all keys in first-seen order; missing cells are blank.
pub fn format_table(messages: &[Message], verbosity: i64, color: bool) -> String {
    if messages.is_empty() {
        return String::new();
    }

    let rows: Vec<Payload> = messages
        .iter()
        .map(|m| {
            if verbosity < 1 {
                m.ellipsized().flatten()
            } else {
                m.flatten()
            }
        })
        .collect();

    let mut columns: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|col| row.get(*col).map(display_value).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(cells.len() + 2);

    let header = join_padded(columns.iter().map(|c| c.to_string()), &widths);
    lines.push(if color {
        header.bold().to_string()
    } else {
        header
    });
    lines.push(join_padded(widths.iter().map(|w| "-".repeat(*w)), &widths));
    for row in cells {
        lines.push(join_padded(row.into_iter(), &widths));
    }

    lines.join("\n")
}

fn join_padded(values: impl Iterator<Item = String>, widths: &[usize]) -> String {
    let padded: Vec<String> = values
        .zip(widths)
        .map(|(value, width)| {
            let fill = width.saturating_sub(value.chars().count());
            format!("{}{}", value, " ".repeat(fill))
        })
        .collect();
    padded.join("  ").trim_end().to_string()
}

/// JSON array of flattened messages.
pub fn format_json(messages: &[Message]) -> Result<String> {
    let flat: Vec<Payload> = messages.iter().map(Message::flatten).collect();
    Ok(serde_json::to_string(&flat)?)
}

/// One `probe|time|target|key:value|...` line per message.
pub fn format_grep(messages: &[Message]) -> String {
    messages
        .iter()
        .map(Message::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn message(probe: &str, payload: Value) -> Message {
        Message::new(
            probe,
            "C:\\Program Files\\App\\app.exe",
            payload.as_object().cloned().unwrap(),
        )
        .with_time("2024-03-01 10:00:00")
    }

    #[test]
    fn test_table_ellipsizes_at_low_verbosity() {
        let messages = vec![message("socket", json!({"function": "connect", "dest": "10.0.0.1:443"}))];

        let quiet = format_table(&messages, 0, false);
        let verbose = format_table(&messages, 1, false);

        assert!(quiet.contains("C:/.../app.exe"));
        assert!(verbose.contains("C:\\Program Files\\App\\app.exe"));
    }

    #[test]
    fn test_table_aligns_union_of_columns() {
        let messages = vec![
            message("registry", json!({"function": "RegOpenKeyExW", "hkey": "HKEY_CURRENT_USER"})),
            message("registry", json!({"function": "RegQueryValueExW", "value": "Path"})),
        ];

        let table = format_table(&messages, 0, false);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("probe"));
        assert!(lines[0].ends_with("value"));
        assert!(lines[1].starts_with("--------"));
        // header and rows line up on the function column
        let col = lines[0].find("function").unwrap();
        assert_eq!(&lines[2][col..col + 13], "RegOpenKeyExW");
        assert_eq!(&lines[3][col..col + 16], "RegQueryValueExW");
    }

    #[test]
    fn test_empty_table_is_blank() {
        assert_eq!(format_table(&[], 0, true), "");
    }

    #[test]
    fn test_json_is_flattened() {
        let messages = vec![message("dlls", json!({"dll": "version.dll"}))];

        let parsed: Value = serde_json::from_str(&format_json(&messages).unwrap()).unwrap();
        assert_eq!(parsed[0]["probe"], "dlls");
        assert_eq!(parsed[0]["dll"], "version.dll");
        assert_eq!(parsed[0]["target"], "C:\\Program Files\\App\\app.exe");
    }

    #[test]
    fn test_grep_lines() {
        let messages = vec![
            message("pipes", json!({"function": "CreateNamedPipeW", "name": "\\\\.\\pipe\\x"})),
            message("pipes", json!({"function": "ConnectNamedPipe"})),
        ];

        let grep = format_grep(&messages);
        let lines: Vec<&str> = grep.lines().collect();
        assert_eq!(
            lines[1],
            "pipes|2024-03-01 10:00:00|C:\\Program Files\\App\\app.exe|function:ConnectNamedPipe"
        );
    }
}
