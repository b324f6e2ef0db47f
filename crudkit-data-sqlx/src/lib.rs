//! # crudkit-data-sqlx: SQL backend for crudkit
//!
//! This crate provides a [`CrudProvider`](crudkit_data::CrudProvider) over a
//! relational database through the [SQLx](https://github.com/launchbadge/sqlx)
//! `Any` driver. It depends on [`crudkit-data`] for the contract and the
//! query builder, and adds pool handling, row decoding and error bridging.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlProvider`] | `CrudProvider` holding a lazily connecting `AnyPool` |
//! | [`SqlConfig`] | URL, pool size, resource → table mapping, key columns |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` → `DataError` (`.into_data_error()`) |
//!
//! # Feature flags
//!
//! | Feature    | Driver |
//! |------------|--------|
//! | `sqlite`   | SQLite via `sqlx/sqlite` (default) |
//! | `postgres` | PostgreSQL via `sqlx/postgres` |
//! | `mysql`    | MySQL via `sqlx/mysql` |
//!
//! The URL scheme picks both the driver and the SQL dialect, so one binary
//! can talk to any enabled database.
//!
//! # Quick start
//!
//! ```no_run
//! use crudkit_data::prelude::*;
//! use crudkit_data_sqlx::{SqlConfig, SqlProvider};
//!
//! # async fn run() -> Result<(), DataError> {
//! let provider = SqlProvider::new(SqlConfig::new("sqlite::memory:"))?;
//! let page = provider
//!     .get_list(ListParams::new("orders").paginate(1, 20).sort_by("created_at", SortOrder::Desc))
//!     .await?;
//! println!("{} of {}", page.data.len(), page.total);
//! # Ok(())
//! # }
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead when running
//! your own statements against [`SqlProvider::pool`]:
//!
//! ```ignore
//! use crudkit_data_sqlx::SqlxErrorExt;
//!
//! sqlx::query("DELETE FROM sessions")
//!     .execute(provider.pool())
//!     .await
//!     .map_err(|e| e.into_data_error(Operation::Delete, "sessions", None))?;
//! ```

pub mod config;
pub mod error;
pub mod provider;
mod row;

pub use config::SqlConfig;
pub use error::SqlxErrorExt;
pub use provider::SqlProvider;

/// Re-exports of the most commonly used types from both `crudkit-data` and this crate.
pub mod prelude {
    pub use crate::{SqlConfig, SqlProvider, SqlxErrorExt};
    pub use crudkit_data::prelude::*;
}
