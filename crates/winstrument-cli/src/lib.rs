mod args;
mod commands;
mod context;
mod handlers;
pub mod presentation;
pub mod types;

pub use args::{Cli, Commands, ConfigCommand};
pub use commands::run;
