//! Persistent upload sessions (SQLite via sqlx).
//!
//! Lets an upload interrupted by a process exit find its server session again
//! on the next run: the record is keyed by source path, size and content nonce.

mod db;
mod sessions;
mod types;

pub use db::SessionStore;
pub use types::{NewSessionRecord, SessionRecord};
