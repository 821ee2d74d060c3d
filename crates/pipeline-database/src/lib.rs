//! # pipeline-database
//!
//! Entity store implementations: an in-memory store used by tests and
//! single-process deployments, and a PostgreSQL store that keeps every
//! entity as a JSONB document in one `records` table.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod postgres;

mod keys;

pub use connection::{DatabasePool, ModelCount};
pub use memory::MemoryStore;
pub use postgres::PgStore;
