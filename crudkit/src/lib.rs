//! crudkit: one CRUD contract over many data backends.
//!
//! This facade crate re-exports the crudkit sub-crates and adds the pieces
//! that tie them together: the provider factory and configuration loading.
//!
//! ```no_run
//! use crudkit::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // application.yaml:
//! //   data:
//! //     provider: { type: sql, config: { url: "${DATABASE_URL}" } }
//! //   engine: { enable_audit: true }
//! let engine = CrudConfig::load("dev")?.build_engine()?;
//! let orders = engine
//!     .get_list(ListParams::new("orders").paginate(1, 20).sort_by("created_at", SortOrder::Desc))
//!     .await?;
//! println!("{} of {}", orders.data.len(), orders.total);
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate                            |
//! |------------|---------|----------------------------------|
//! | `sql`      | **yes** | `crudkit-data-sqlx` (SQLite)     |
//! | `http`     | **yes** | `crudkit-http`                   |
//! | `sqlite`   | no      | `crudkit-data-sqlx/sqlite`       |
//! | `postgres` | no      | `crudkit-data-sqlx/postgres`     |
//! | `mysql`    | no      | `crudkit-data-sqlx/mysql`        |
//!
//! Provider types whose crate is disabled are still recognised by the
//! factory but fail with `DataError::InvalidConfig`.

pub mod config;
pub mod registry;

pub use crudkit_data;
pub use crudkit_engine;

#[cfg(feature = "sql")]
pub use crudkit_data_sqlx;

#[cfg(feature = "http")]
pub use crudkit_http;

pub use config::{ConfigError, CrudConfig};
pub use crudkit_data::{CrudProvider, DataError};
pub use crudkit_engine::{init_tracing, CallOptions, CrudEngine, LogFormat};
pub use registry::{create_data_provider, create_data_provider_from, ProviderSpec, ProviderType};

pub mod prelude {
    //! Everything needed to configure a provider and run CRUD calls.
    pub use crate::config::{ConfigError, CrudConfig};
    pub use crate::registry::{create_data_provider, create_data_provider_from, ProviderSpec, ProviderType};
    pub use crudkit_data::prelude::*;
    pub use crudkit_engine::prelude::*;
    pub use crudkit_engine::{CancellationToken, EngineSettings};
}
