use anyhow::Result;
use serde_json::Value;

use crate::probe::{Probe, ProbeContext, record_payload};

const HKEY_NAMES: &[(u64, &str)] = &[
    (0x8000_0000, "HKEY_CLASSES_ROOT"),
    (0x8000_0001, "HKEY_CURRENT_USER"),
    (0x8000_0002, "HKEY_LOCAL_MACHINE"),
    (0x8000_0003, "HKEY_USERS"),
    (0x8000_0005, "HKEY_CURRENT_CONFIG"),
];

/// Registry access, with predefined root handles replaced by their names.
pub struct Registry;

impl Probe for Registry {
    fn name(&self) -> &str {
        "registry"
    }

    fn script(&self) -> &'static str {
        include_str!("../../scripts/registry.js")
    }

    fn on_message(&mut self, ctx: &mut ProbeContext<'_>, mut payload: Value) -> Result<()> {
        if let Some(hkey) = payload.get_mut("hkey")
            && let Some(name) = root_key_name(hkey)
        {
            *hkey = Value::from(name);
        }
        record_payload(ctx, payload)
    }
}

/// Name of a predefined root key. Agents send handles either as numbers
/// or as pointer strings (`"0x80000002"`).
fn root_key_name(value: &Value) -> Option<&'static str> {
    let handle = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => parse_handle(s)?,
        _ => return None,
    };
    HKEY_NAMES
        .iter()
        .find(|(value, _)| *value == handle)
        .map(|(_, name)| *name)
}

fn parse_handle(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::Harness;
    use serde_json::json;

    #[test]
    fn test_maps_pointer_string() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("registry");

        Registry
            .on_message(
                &mut ctx,
                json!({"function": "RegOpenKeyExW", "hkey": "0x80000002", "subkey": "SOFTWARE\\App"}),
            )
            .unwrap();

        assert_eq!(harness.output[0].payload["hkey"], "HKEY_LOCAL_MACHINE");
        assert_eq!(harness.output[0].payload["subkey"], "SOFTWARE\\App");
    }

    #[test]
    fn test_maps_numeric_handle() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("registry");

        Registry
            .on_message(&mut ctx, json!({"hkey": 2147483649u64, "subkey": "Environment"}))
            .unwrap();

        assert_eq!(harness.output[0].payload["hkey"], "HKEY_CURRENT_USER");
    }

    #[test]
    fn test_leaves_opened_subkey_handles_alone() {
        let mut harness = Harness::new();
        let mut ctx = harness.ctx("registry");

        Registry
            .on_message(&mut ctx, json!({"hkey": "0x1a4", "subkey": "Run"}))
            .unwrap();
        Registry
            .on_message(&mut ctx, json!({"function": "RegQueryValueExW", "value": "Path"}))
            .unwrap();

        assert_eq!(harness.output[0].payload["hkey"], "0x1a4");
        assert!(!harness.output[1].payload.contains_key("hkey"));
    }
}
