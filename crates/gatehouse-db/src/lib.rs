//! Gatehouse Database Layer
//!
//! This crate provides the persistence layer for Gatehouse,
//! using SQLite via sqlx. The auth core consumes it only as a
//! credential lookup collaborator.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::Database;

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
