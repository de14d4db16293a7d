use anyhow::Result;
use serde_json::Value;
use winstrument_types::Payload;

use crate::Error;
use crate::probe::{Probe, ProbeContext};

/// Records which account a thread impersonated.
///
/// The agent resolves the token owner to `DOMAIN\user` before sending.
pub struct Impersonate;

impl Probe for Impersonate {
    fn name(&self) -> &str {
        "impersonate"
    }

    fn script(&self) -> &'static str {
        include_str!("../../scripts/impersonate.js")
    }

    fn on_message(&mut self, ctx: &mut ProbeContext<'_>, payload: Value) -> Result<()> {
        let function = payload
            .get("function")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MalformedEvent("impersonate event without function".into()))?;
        let user = payload
            .get("user")
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        let mut record = Payload::new();
        record.insert("function".to_string(), Value::from(function));
        record.insert("user".to_string(), Value::from(user));
        ctx.emit(record)
    }
}
