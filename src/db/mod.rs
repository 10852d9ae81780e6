//! Database module
//!
//! PostgreSQL integration using sqlx. Only panel accounts live here;
//! channel data is never persisted locally, the remote plugin
//! configuration is the sole source of truth.

pub mod models;
pub mod pool;
pub mod repository;

pub use models::AccountRow;
pub use pool::{create_pool, health_check, run_migrations};
