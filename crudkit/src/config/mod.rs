mod loader;
pub mod secrets;

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crudkit_data::{CrudProvider, DataError};
use crudkit_engine::{CrudEngine, EngineSettings};

use crate::registry::{create_data_provider, ProviderSpec};

pub use secrets::{resolve_placeholders, DefaultSecretResolver, SecretResolver};

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "CRUDKIT_PROFILE";

/// Key of the provider description.
pub const PROVIDER_KEY: &str = "data.provider";

/// Key of the engine settings.
pub const ENGINE_KEY: &str = "engine";

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key is absent.
    NotFound(String),
    /// A `${...}` placeholder names a variable that is not set.
    Unresolved(String),
    /// The value at a key does not have the expected shape.
    Invalid { key: String, message: String },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::Unresolved(reference) => {
                write!(f, "Config placeholder '${{{reference}}}' could not be resolved")
            }
            ConfigError::Invalid { key, message } => write!(f, "Invalid config at '{key}': {message}"),
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for DataError {
    fn from(err: ConfigError) -> Self {
        DataError::InvalidConfig(err.to_string())
    }
}

/// Application configuration loaded from YAML files and `.env` files.
///
/// Resolution order (lowest to highest priority):
/// 1. `application.yaml` (base)
/// 2. `application-{profile}.yaml` (profile override, deep-merged)
/// 3. `.env` then `.env.{profile}`, loaded into the process environment
///    without overwriting variables that are already set
/// 4. `${VAR}`, `${env:VAR}` and `${file:/path}` placeholders in string values
///
/// Profile is determined by: `CRUDKIT_PROFILE` env var > argument > `"dev"`.
///
/// ```yaml
/// data:
///   provider:
///     type: sql
///     config:
///       url: ${DATABASE_URL}
/// engine:
///   enable_audit: true
/// ```
#[derive(Debug, Clone)]
pub struct CrudConfig {
    root: Value,
    profile: String,
}

impl CrudConfig {
    /// Load the configuration from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from_dir(Path::new("."), profile)
    }

    pub fn load_from_dir(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        Self::load_with_resolver(dir, profile, &DefaultSecretResolver)
    }

    pub fn load_with_resolver(
        dir: &Path,
        profile: &str,
        resolver: &dyn SecretResolver,
    ) -> Result<Self, ConfigError> {
        let profile = active_profile(profile);

        let mut root = loader::load_yaml_file(&dir.join("application.yaml"))?
            .unwrap_or_else(|| Value::Mapping(Default::default()));
        if let Some(overlay) = loader::load_yaml_file(&dir.join(format!("application-{profile}.yaml")))? {
            loader::deep_merge(&mut root, overlay);
        }

        // Missing .env files are fine; malformed ones are not.
        for name in [".env".to_string(), format!(".env.{profile}")] {
            let path = dir.join(&name);
            if path.exists() {
                dotenvy::from_path(&path).map_err(|e| ConfigError::Load(format!("{name}: {e}")))?;
            }
        }

        loader::resolve_strings(&mut root, resolver)?;
        tracing::debug!(profile = %profile, dir = %dir.display(), "configuration loaded");
        Ok(Self { root, profile })
    }

    /// Parse a YAML string, resolving placeholders (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut root = loader::parse_yaml(yaml)?;
        loader::resolve_strings(&mut root, &DefaultSecretResolver)?;
        Ok(Self {
            root,
            profile: profile.to_string(),
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn contains(&self, key: &str) -> bool {
        loader::lookup(&self.root, key).is_some_and(|v| !v.is_null())
    }

    /// Deserialize the value at a dot-separated key.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T, ConfigError> {
        let value = loader::lookup(&self.root, key)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Like [`get`](Self::get), with `default` for absent keys.
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        match self.get(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    /// The `data.provider` section.
    pub fn provider_spec(&self) -> Result<ProviderSpec, ConfigError> {
        self.get(PROVIDER_KEY)
    }

    /// The `engine` section, defaults when absent.
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        self.get_or(ENGINE_KEY, EngineSettings::default())
    }

    /// Build the configured provider.
    pub fn create_provider(&self) -> Result<Arc<dyn CrudProvider>, DataError> {
        create_data_provider(&self.provider_spec()?)
    }

    /// Build the configured provider and an engine around it.
    pub fn build_engine(&self) -> Result<CrudEngine, DataError> {
        let provider = self.create_provider()?;
        CrudEngine::from_settings(provider, &self.engine_settings()?)
    }
}

fn active_profile(requested: &str) -> String {
    match std::env::var(PROFILE_ENV) {
        Ok(profile) if !profile.trim().is_empty() => profile,
        _ if !requested.trim().is_empty() => requested.to_string(),
        _ => "dev".to_string(),
    }
}
