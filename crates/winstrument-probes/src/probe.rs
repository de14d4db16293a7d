use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use winstrument_types::{Message, Payload, Pid, SessionState};

use crate::Error;

/// Destination for messages a probe emits.
///
/// The runtime implements this over the message store; tests usually
/// collect into a `Vec<Message>`.
pub trait MessageSink {
    fn write(&mut self, message: Message) -> Result<()>;
}

impl MessageSink for Vec<Message> {
    fn write(&mut self, message: Message) -> Result<()> {
        self.push(message);
        Ok(())
    }
}

/// Engine subscriptions a probe may request before its script runs.
pub trait ScriptHooks {
    /// Route this probe's script `message` events to `Probe::on_message`.
    fn subscribe_messages(&mut self) -> Result<()>;
}

/// Everything a probe callback can see about the session it is bound to.
pub struct ProbeContext<'a> {
    pub probe: &'a str,
    /// Executable path of the instrumented process
    pub target: &'a str,
    pub pid: Pid,
    pub session_state: SessionState,
    /// The probe's own settings namespace
    pub settings: &'a BTreeMap<String, String>,
    pub sink: &'a mut dyn MessageSink,
}

impl ProbeContext<'_> {
    /// Persist one payload as a message attributed to this probe and target.
    pub fn emit(&mut self, payload: Payload) -> Result<()> {
        let message = Message::new(self.probe, self.target, payload);
        self.sink.write(message)
    }

    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }
}

/// A pluggable analysis module bound to one session.
///
/// One instance exists per (probe name, session). The driver calls
/// `register_callbacks`, loads `script()` into the target, then `on_load`.
/// `on_message` runs for each `send` from the script, and `on_finish` runs
/// exactly once after the session detaches.
pub trait Probe: Send {
    fn name(&self) -> &str;

    /// Agent source injected into the target.
    fn script(&self) -> &'static str;

    fn register_callbacks(&mut self, hooks: &mut dyn ScriptHooks) -> Result<()> {
        hooks.subscribe_messages()
    }

    fn on_load(&mut self, _ctx: &mut ProbeContext<'_>) -> Result<()> {
        Ok(())
    }

    fn on_message(&mut self, ctx: &mut ProbeContext<'_>, payload: Value) -> Result<()> {
        record_payload(ctx, payload)
    }

    fn on_finish(&mut self, _ctx: &mut ProbeContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Default message handling: store the payload object as-is.
pub fn record_payload(ctx: &mut ProbeContext<'_>, payload: Value) -> Result<()> {
    match payload {
        Value::Object(map) => ctx.emit(map),
        other => Err(Error::MalformedEvent(format!(
            "{} sent a non-object payload: {}",
            ctx.probe, other
        ))
        .into()),
    }
}
