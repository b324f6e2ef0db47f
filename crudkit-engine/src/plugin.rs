//! Plugin contract for the CRUD engine.
//!
//! Plugins are attached when the engine is built and cannot be added or
//! removed afterwards. [`Plugin::initialize`] runs exactly once, in
//! registration order, before the engine serves any operation.

use std::sync::Arc;

use crudkit_data::{CrudProvider, DataError};

use crate::hooks::Hooks;

/// A named bundle of hooks.
///
/// # Example
///
/// ```
/// use crudkit_engine::{Hooks, Plugin};
///
/// struct StampSource;
///
/// impl Plugin for StampSource {
///     fn name(&self) -> &str {
///         "stamp-source"
///     }
///
///     fn hooks(&self) -> Hooks {
///         Hooks::new().before_create(|mut params| {
///             params.data.insert("source".into(), "engine".into());
///             Ok(params)
///         })
///     }
/// }
/// ```
pub trait Plugin: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Called once at engine construction. An error aborts the build.
    fn initialize(&self, _ctx: &EngineContext) -> Result<(), DataError> {
        Ok(())
    }

    fn hooks(&self) -> Hooks;
}

impl<P: Plugin + ?Sized> Plugin for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn initialize(&self, ctx: &EngineContext) -> Result<(), DataError> {
        (**self).initialize(ctx)
    }

    fn hooks(&self) -> Hooks {
        (**self).hooks()
    }
}

/// What a plugin can see of the engine while it is being built.
#[derive(Clone)]
pub struct EngineContext {
    pub(crate) provider: Arc<dyn CrudProvider>,
    pub(crate) default_locale: String,
    pub(crate) supported_locales: Vec<String>,
    pub(crate) plugins: Vec<String>,
}

impl EngineContext {
    pub fn provider(&self) -> &Arc<dyn CrudProvider> {
        &self.provider
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn supported_locales(&self) -> &[String] {
        &self.supported_locales
    }

    /// Names of every plugin attached to the engine, in registration order.
    pub fn plugins(&self) -> &[String] {
        &self.plugins
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("provider", &self.provider.name())
            .field("default_locale", &self.default_locale)
            .field("supported_locales", &self.supported_locales)
            .field("plugins", &self.plugins)
            .finish()
    }
}
