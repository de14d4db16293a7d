use anyhow::Result;
use serde_json::Value;
use std::collections::HashSet;
use winstrument_types::{Payload, file_name};

use crate::probe::{Probe, ProbeContext};

/// Library loads, one message per distinct DLL per session.
#[derive(Default)]
pub struct Dlls {
    seen: HashSet<String>,
}

impl Dlls {
    /// `kernel32` → `kernel32.dll`; paths keep only their last component.
    fn normalize(lib_filename: &str) -> String {
        let name = file_name(lib_filename);
        if name.to_lowercase().ends_with(".dll") {
            name.to_string()
        } else {
            format!("{}.dll", name)
        }
    }
}

impl Probe for Dlls {
    fn name(&self) -> &str {
        "dlls"
    }

    fn script(&self) -> &'static str {
        include_str!("../../scripts/dlls.js")
    }

    fn on_message(&mut self, ctx: &mut ProbeContext<'_>, payload: Value) -> Result<()> {
        // LoadLibrary(NULL) reports a null filename
        let Some(lib_filename) = payload.get("lib_filename").and_then(Value::as_str) else {
            return Ok(());
        };

        let dll = Self::normalize(lib_filename);
        if !self.seen.insert(dll.to_lowercase()) {
            return Ok(());
        }

        let mut record = Payload::new();
        record.insert("dll".to_string(), Value::from(dll));
        record.insert("path".to_string(), Value::from(lib_filename));
        ctx.emit(record)
    }
}
