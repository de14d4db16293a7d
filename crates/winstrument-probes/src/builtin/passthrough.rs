use crate::Probe;

/// A probe whose script already sends the final payload shape.
///
/// Every `send` is stored unchanged through the default `on_message`.
pub struct Passthrough {
    name: &'static str,
    script: &'static str,
}

impl Passthrough {
    pub fn new(name: &'static str, script: &'static str) -> Self {
        Self { name, script }
    }
}

impl Probe for Passthrough {
    fn name(&self) -> &str {
        self.name
    }

    fn script(&self) -> &'static str {
        self.script
    }
}
