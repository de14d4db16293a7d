use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use winstrument_types::{Payload, display_value};

use crate::Error;
use crate::probe::{Probe, ProbeContext};

const INVALID_HANDLE_VALUE: u64 = 0xffff_ffff;

const ACCESS_MODES: &[(u64, &str)] = &[
    (0x8000_0000, "GENERIC_READ"),
    (0x4000_0000, "GENERIC_WRITE"),
    (0xc000_0000, "GENERIC_READ | GENERIC_WRITE"),
    (0x1000_0000, "GENERIC_ALL"),
];

#[derive(Debug, Default)]
struct Transfer {
    path: String,
    bytes: u64,
    calls: u64,
}

/// File opens plus per-handle read/write totals.
///
/// `CreateFileW` is stored immediately. Reads and writes on tracked
/// handles are summed and stored once per (handle, function) on finish.
#[derive(Default)]
pub struct FileRw {
    handles: HashMap<String, String>,
    transfers: HashMap<(String, String), Transfer>,
    order: Vec<(String, String)>,
}

impl FileRw {
    fn on_create(&mut self, ctx: &mut ProbeContext<'_>, payload: &Value) -> Result<()> {
        let path = payload
            .get("path")
            .map(display_value)
            .unwrap_or_default();
        let raw_fh = payload.get("fh").cloned().unwrap_or(Value::Null);

        let fh = if as_u64(&raw_fh) == Some(INVALID_HANDLE_VALUE) {
            Value::from("INVALID_HANDLE_VALUE")
        } else {
            self.handles.insert(display_value(&raw_fh), path.clone());
            raw_fh
        };

        let mut record = Payload::new();
        record.insert("function".to_string(), Value::from("CreateFileW"));
        record.insert("fh".to_string(), fh);
        record.insert("path".to_string(), Value::from(path));
        record.insert(
            "mode".to_string(),
            payload.get("mode").map(access_mode).unwrap_or(Value::Null),
        );
        ctx.emit(record)
    }

    fn on_transfer(&mut self, function: &str, payload: &Value) {
        let Some(fh) = payload.get("fh").map(display_value) else {
            return;
        };
        let Some(path) = self.handles.get(&fh) else {
            return;
        };

        // ReadFileEx completes asynchronously and only reports the request size
        let bytes = match function {
            "WriteFile" => payload.get("bytes_written"),
            _ => payload.get("bytes_read").or_else(|| payload.get("bytes_to_read")),
        }
        .and_then(as_u64)
        .unwrap_or(0);

        let key = (fh, function.to_string());
        let transfer = self.transfers.entry(key.clone()).or_insert_with(|| {
            self.order.push(key);
            Transfer {
                path: path.clone(),
                ..Transfer::default()
            }
        });
        transfer.bytes += bytes;
        transfer.calls += 1;
    }
}

impl Probe for FileRw {
    fn name(&self) -> &str {
        "file_rw"
    }

    fn script(&self) -> &'static str {
        include_str!("../../scripts/file_rw.js")
    }

    fn on_message(&mut self, ctx: &mut ProbeContext<'_>, payload: Value) -> Result<()> {
        let function = payload
            .get("function")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedEvent("file_rw event without function".into()))?
            .to_string();

        match function.as_str() {
            "CreateFileW" => self.on_create(ctx, &payload),
            "WriteFile" | "ReadFile" | "ReadFileEx" => {
                self.on_transfer(&function, &payload);
                Ok(())
            }
            other => {
                tracing::debug!(function = other, "file_rw ignoring unknown function");
                Ok(())
            }
        }
    }

    fn on_finish(&mut self, ctx: &mut ProbeContext<'_>) -> Result<()> {
        for (fh, function) in std::mem::take(&mut self.order) {
            let Some(transfer) = self.transfers.remove(&(fh.clone(), function.clone())) else {
                continue;
            };
            let mut record = Payload::new();
            record.insert("function".to_string(), Value::from(function));
            record.insert("fh".to_string(), Value::from(fh));
            record.insert("path".to_string(), Value::from(transfer.path));
            record.insert("bytes".to_string(), Value::from(transfer.bytes));
            record.insert("calls".to_string(), Value::from(transfer.calls));
            ctx.emit(record)?;
        }
        Ok(())
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => u64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

fn access_mode(value: &Value) -> Value {
    as_u64(value)
        .and_then(|mask| ACCESS_MODES.iter().find(|(m, _)| *m == mask))
        .map(|(_, name)| Value::from(*name))
        .unwrap_or_else(|| value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::Harness;
    use serde_json::json;

    #[test]
    fn test_create_names_mode_and_invalid_handle() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("file_rw");
        let mut probe = FileRw::default();

        probe
            .on_message(
                &mut ctx,
                json!({"function": "CreateFileW", "path": "C:\\a.txt", "mode": "0xc0000000", "fh": 100}),
            )
            .unwrap();
        probe
            .on_message(
                &mut ctx,
                json!({"function": "CreateFileW", "path": "C:\\missing.txt", "mode": 2147483648u64, "fh": 4294967295u64}),
            )
            .unwrap();

        let first = &harness.output[0].payload;
        assert_eq!(first["mode"], "GENERIC_READ | GENERIC_WRITE");
        assert_eq!(first["fh"], 100);
        let second = &harness.output[1].payload;
        assert_eq!(second["mode"], "GENERIC_READ");
        assert_eq!(second["fh"], "INVALID_HANDLE_VALUE");
    }

    #[test]
    fn test_transfers_are_summed_on_finish() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("file_rw");
        let mut probe = FileRw::default();

        let events = [
            json!({"function": "CreateFileW", "path": "C:\\log.txt", "mode": "0x40000000", "fh": 7}),
            json!({"function": "WriteFile", "fh": 7, "bytes_to_write": 10, "bytes_written": 10}),
            json!({"function": "WriteFile", "fh": 7, "bytes_to_write": 5, "bytes_written": 4}),
            json!({"function": "ReadFileEx", "fh": 7, "bytes_to_read": 64}),
            json!({"function": "ReadFile", "fh": 99, "bytes_to_read": 8, "bytes_read": 8}),
        ];
        for event in events {
            probe.on_message(&mut ctx, event).unwrap();
        }
        probe.on_finish(&mut ctx).unwrap();

        assert_eq!(harness.output.len(), 3);
        assert_eq!(harness.output[0].payload["function"], "CreateFileW");
        let write = &harness.output[1].payload;
        assert_eq!(write["function"], "WriteFile");
        assert_eq!(write["path"], "C:\\log.txt");
        assert_eq!(write["bytes"], 14);
        assert_eq!(write["calls"], 2);
        let read = &harness.output[2].payload;
        assert_eq!(read["function"], "ReadFileEx");
        assert_eq!(read["bytes"], 64);
    }

    #[test]
    fn test_missing_function_is_malformed() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("file_rw");

        assert!(
            FileRw::default()
                .on_message(&mut ctx, json!({"fh": 1}))
                .is_err()
        );
    }
}
