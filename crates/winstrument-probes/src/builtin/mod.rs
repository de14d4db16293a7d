//! Probes shipped with winstrument.
//!
//! Each constructor matches the `fn() -> Box<dyn Probe>` shape used by the
//! catalog table.

mod dlls;
mod file_rw;
mod impersonate;
mod passthrough;
mod registry;

pub use dlls::Dlls;
pub use file_rw::FileRw;
pub use impersonate::Impersonate;
pub use passthrough::Passthrough;
pub use registry::Registry;

use crate::Probe;

pub fn socket() -> Box<dyn Probe> {
    Box::new(Passthrough::new(
        "socket",
        include_str!("../../scripts/socket.js"),
    ))
}

pub fn registry() -> Box<dyn Probe> {
    Box::new(Registry)
}

pub fn file_rw() -> Box<dyn Probe> {
    Box::new(FileRw::default())
}

pub fn dlls() -> Box<dyn Probe> {
    Box::new(Dlls::default())
}

pub fn impersonate() -> Box<dyn Probe> {
    Box::new(Impersonate)
}

pub fn pipes() -> Box<dyn Probe> {
    Box::new(Passthrough::new("pipes", include_str!("../../scripts/pipes.js")))
}

pub fn process() -> Box<dyn Probe> {
    Box::new(Passthrough::new(
        "process",
        include_str!("../../scripts/process.js"),
    ))
}

pub fn com_hijack() -> Box<dyn Probe> {
    Box::new(Passthrough::new(
        "com_hijack",
        include_str!("../../scripts/com_hijack.js"),
    ))
}
