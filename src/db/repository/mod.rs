//! Database repositories
//!
//! Repository pattern for database access, separating data access logic
//! from route handlers.

pub mod accounts;
