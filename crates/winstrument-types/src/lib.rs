pub mod message;
pub mod probe;
pub mod script;
pub mod session;
mod util;

pub use message::*;
pub use probe::*;
pub use script::*;
pub use session::*;
pub use util::*;
