//! Persistence layer — libSQL-backed sessions and message log.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{Direction, LogEntry, MessageLog, SessionRepository};
