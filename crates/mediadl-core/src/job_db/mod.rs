//! Persistent job store (SQLite via sqlx).
//!
//! Holds job rows and their lifecycle state, provider rows, the provider
//! pause registry, rate-limit deferrals, and the audit trail. The scheduler
//! and worker processes coordinate only through this database.

pub mod audit;
pub mod clock;
pub mod db;
pub mod deferrals;
mod jobs;
pub mod providers;
pub mod types;

pub use audit::AuditAction;
pub use db::JobDb;
pub use types::*;

#[cfg(test)]
pub(crate) use db::open_memory;
