//! Provider factory.
//!
//! Turns a `{ type, config }` description into a ready [`CrudProvider`].
//! Construction never performs I/O: SQL pools connect lazily and HTTP
//! clients only open connections on the first call.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crudkit_data::{CrudProvider, DataError, MemoryConfig, MemoryProvider};

/// The closed set of backends the factory can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderType {
    Memory,
    Sql,
    Rest,
    Strapi,
    Graphql,
    Airtable,
}

impl ProviderType {
    pub const ALL: [ProviderType; 6] = [
        ProviderType::Memory,
        ProviderType::Sql,
        ProviderType::Rest,
        ProviderType::Strapi,
        ProviderType::Graphql,
        ProviderType::Airtable,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::Memory => "memory",
            ProviderType::Sql => "sql",
            ProviderType::Rest => "rest",
            ProviderType::Strapi => "strapi",
            ProviderType::Graphql => "graphql",
            ProviderType::Airtable => "airtable",
        }
    }

    fn unsupported(given: &str) -> DataError {
        DataError::UnsupportedProviderType {
            given: given.to_string(),
            supported: Self::ALL.iter().map(|t| t.as_str()).collect(),
        }
    }
}

impl FromStr for ProviderType {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Self::unsupported(s))
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serialized provider description, as found under `data.provider`.
///
/// ```yaml
/// data:
///   provider:
///     type: rest
///     config:
///       base_url: https://api.example.com
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub config: Value,
}

impl ProviderSpec {
    pub fn new(kind: impl Into<String>, config: Value) -> Self {
        Self {
            kind: kind.into(),
            config,
        }
    }

    pub fn provider_type(&self) -> Result<ProviderType, DataError> {
        self.kind.parse()
    }
}

/// Build the provider described by `spec`.
///
/// Unknown types fail with [`DataError::UnsupportedProviderType`] listing
/// every supported type; malformed or invalid configs fail with
/// [`DataError::InvalidConfig`].
///
/// The `sql` provider creates its pool lazily and must be built inside a
/// Tokio runtime.
pub fn create_data_provider(spec: &ProviderSpec) -> Result<Arc<dyn CrudProvider>, DataError> {
    let kind = spec.provider_type()?;
    debug!(provider = kind.as_str(), "creating data provider");
    let config = &spec.config;
    let provider: Arc<dyn CrudProvider> = match kind {
        ProviderType::Memory => Arc::new(MemoryProvider::from_config(parse::<MemoryConfig>(kind, config)?)?),
        #[cfg(feature = "sql")]
        ProviderType::Sql => Arc::new(crudkit_data_sqlx::SqlProvider::new(parse(kind, config)?)?),
        #[cfg(feature = "http")]
        ProviderType::Rest => Arc::new(crudkit_http::RestProvider::new(parse(kind, config)?)?),
        #[cfg(feature = "http")]
        ProviderType::Strapi => Arc::new(crudkit_http::StrapiProvider::new(parse(kind, config)?)?),
        #[cfg(feature = "http")]
        ProviderType::Graphql => Arc::new(crudkit_http::GraphqlProvider::new(parse(kind, config)?)?),
        #[cfg(feature = "http")]
        ProviderType::Airtable => Arc::new(crudkit_http::AirtableProvider::new(parse(kind, config)?)?),
        #[allow(unreachable_patterns)]
        disabled => {
            return Err(DataError::InvalidConfig(format!(
                "provider '{disabled}' is not compiled in (enable the crudkit `{}` feature)",
                feature_of(disabled)
            )))
        }
    };
    Ok(provider)
}

/// Shorthand for `create_data_provider(&ProviderSpec::new(kind, config))`.
pub fn create_data_provider_from(kind: &str, config: Value) -> Result<Arc<dyn CrudProvider>, DataError> {
    create_data_provider(&ProviderSpec::new(kind, config))
}

/// A missing `config` is read as an empty object so that all-default configs
/// can be omitted.
fn parse<T: DeserializeOwned>(kind: ProviderType, config: &Value) -> Result<T, DataError> {
    let config = match config {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(config)
        .map_err(|e| DataError::InvalidConfig(format!("{kind}: invalid provider config: {e}")))
}

fn feature_of(kind: ProviderType) -> &'static str {
    match kind {
        ProviderType::Sql => "sql",
        ProviderType::Memory => "default",
        _ => "http",
    }
}
