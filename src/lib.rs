//! ibeshi server library
//!
//! Music taste based matchmaking: listening profiles, compatibility scoring,
//! the match lifecycle and conversations between matched users.

pub mod compatibility;
pub mod config;
pub mod conversation;
pub mod matching;
pub mod profile;
pub mod server;
pub mod sqlite_persistence;
pub mod store;
pub mod user;

// Re-export commonly used types for convenience
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};
pub use store::{FullStore, SqliteStore};
