// SQLite message store
// Append-only probe output plus one settings row per namespace

mod db;
mod error;
mod queries;
mod schema;

// Public API
pub use db::{Database, Namespace};
pub use error::{Error, Result};
pub use schema::SCHEMA_VERSION;
