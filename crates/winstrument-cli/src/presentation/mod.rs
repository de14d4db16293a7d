pub mod formatters;
pub mod views;

pub use formatters::{format_grep, format_json, format_messages, format_table};
