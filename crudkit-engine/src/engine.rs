//! The CRUD engine: one provider, an ordered plugin list, five operations.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, Instrument};

use crudkit_data::{
    CreateParams, CrudProvider, DataError, DeleteParams, GetOneParams, ListParams, ListResult,
    Operation, OperationParams, ProviderFuture, RecordResult, UpdateParams,
};

use crate::hooks::{Pipeline, Pipelines};
use crate::options::CallOptions;
use crate::plugin::{EngineContext, Plugin};
use crate::plugins::audit::{AuditPlugin, AuditSink, TracingAuditSink};
use crate::plugins::permissions::{AllowAll, PermissionPolicy, PermissionsPlugin};
use crate::settings::EngineSettings;

type Call<P, R> = for<'a> fn(&'a dyn CrudProvider, P) -> ProviderFuture<'a, R>;

fn call_get_list(provider: &dyn CrudProvider, params: ListParams) -> ProviderFuture<'_, ListResult> {
    provider.get_list(params)
}

fn call_get_one(provider: &dyn CrudProvider, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
    provider.get_one(params)
}

fn call_create(provider: &dyn CrudProvider, params: CreateParams) -> ProviderFuture<'_, RecordResult> {
    provider.create(params)
}

fn call_update(provider: &dyn CrudProvider, params: UpdateParams) -> ProviderFuture<'_, RecordResult> {
    provider.update(params)
}

fn call_delete(provider: &dyn CrudProvider, params: DeleteParams) -> ProviderFuture<'_, RecordResult> {
    provider.delete_one(params)
}

struct EngineInner {
    provider: RwLock<Arc<dyn CrudProvider>>,
    plugins: Vec<Arc<dyn Plugin>>,
    pipelines: Pipelines,
    default_locale: String,
    supported_locales: Vec<String>,
    default_timeout: Option<Duration>,
}

/// Single entry point application code calls.
///
/// Every operation runs the `before` hooks of all plugins in registration
/// order, calls the provider once with the chained params, then runs the
/// `after` hooks in the same order with the caller's original params.
/// `after` hooks only run when the provider call succeeded; provider and
/// hook errors reach the caller unchanged.
///
/// Cloning is cheap and clones share state. The engine keeps no per-call
/// state, so concurrent calls are fine as long as the provider and plugins
/// allow them.
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use std::sync::Arc;
/// use crudkit_data::{ListParams, MemoryProvider, record};
/// use crudkit_engine::CrudEngine;
///
/// let provider = MemoryProvider::new();
/// provider.seed("orders", vec![record! { "status": "open" }]);
/// let engine = CrudEngine::builder(Arc::new(provider)).build().unwrap();
/// let page = engine.get_list(ListParams::new("orders")).await.unwrap();
/// assert_eq!(page.total, 1);
/// # });
/// ```
#[derive(Clone)]
pub struct CrudEngine {
    inner: Arc<EngineInner>,
}

impl CrudEngine {
    pub fn builder(provider: Arc<dyn CrudProvider>) -> CrudEngineBuilder {
        CrudEngineBuilder::new(provider)
    }

    /// Builder pre-filled from the `engine` configuration section.
    pub fn builder_from_settings(
        provider: Arc<dyn CrudProvider>,
        settings: &EngineSettings,
    ) -> CrudEngineBuilder {
        let mut builder = CrudEngineBuilder::new(provider)
            .enable_audit(settings.enable_audit)
            .audit_reads(settings.audit_reads)
            .enable_permissions(settings.enable_permissions)
            .default_locale(settings.default_locale.clone())
            .supported_locales(settings.supported_locales.clone());
        if let Some(policy) = &settings.permissions {
            builder = builder.permission_policy(Arc::new(policy.clone()));
        }
        if let Some(ms) = settings.default_timeout_ms {
            builder = builder.default_timeout(Duration::from_millis(ms));
        }
        builder
    }

    pub fn from_settings(
        provider: Arc<dyn CrudProvider>,
        settings: &EngineSettings,
    ) -> Result<CrudEngine, DataError> {
        Self::builder_from_settings(provider, settings).build()
    }

    /// The live provider.
    pub fn provider(&self) -> Arc<dyn CrudProvider> {
        self.inner
            .provider
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Swap the provider for subsequent calls, returning the previous one.
    /// Calls already in flight finish against the provider they started with.
    pub fn replace_provider(&self, provider: Arc<dyn CrudProvider>) -> Arc<dyn CrudProvider> {
        let mut slot = self
            .inner
            .provider
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::replace(&mut *slot, provider)
    }

    /// Plugin names in execution order, built-ins included.
    pub fn plugins(&self) -> Vec<&str> {
        self.inner.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn default_locale(&self) -> &str {
        &self.inner.default_locale
    }

    pub fn supported_locales(&self) -> &[String] {
        &self.inner.supported_locales
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.inner.default_timeout
    }

    /// Resolve a requested locale against the supported set.
    ///
    /// Exact matches win (case-insensitive), then a match on the primary
    /// language subtag (`fr-CA` → `fr`); anything else yields the default.
    pub fn locale(&self, requested: Option<&str>) -> &str {
        let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) else {
            return &self.inner.default_locale;
        };
        let supported = &self.inner.supported_locales;
        if let Some(found) = supported.iter().find(|l| l.eq_ignore_ascii_case(requested)) {
            return found;
        }
        let primary = requested.split(['-', '_']).next().unwrap_or(requested);
        supported
            .iter()
            .find(|l| l.eq_ignore_ascii_case(primary))
            .map(String::as_str)
            .unwrap_or(&self.inner.default_locale)
    }

    pub async fn get_list(&self, params: ListParams) -> Result<ListResult, DataError> {
        self.get_list_with(params, &CallOptions::default()).await
    }

    pub async fn get_list_with(
        &self,
        params: ListParams,
        options: &CallOptions,
    ) -> Result<ListResult, DataError> {
        self.execute(&self.inner.pipelines.get_list, params, options, call_get_list)
            .await
    }

    pub async fn get_one(&self, params: GetOneParams) -> Result<RecordResult, DataError> {
        self.get_one_with(params, &CallOptions::default()).await
    }

    pub async fn get_one_with(
        &self,
        params: GetOneParams,
        options: &CallOptions,
    ) -> Result<RecordResult, DataError> {
        self.execute(&self.inner.pipelines.get_one, params, options, call_get_one)
            .await
    }

    pub async fn create(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        self.create_with(params, &CallOptions::default()).await
    }

    pub async fn create_with(
        &self,
        params: CreateParams,
        options: &CallOptions,
    ) -> Result<RecordResult, DataError> {
        self.execute(&self.inner.pipelines.create, params, options, call_create)
            .await
    }

    pub async fn update(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        self.update_with(params, &CallOptions::default()).await
    }

    pub async fn update_with(
        &self,
        params: UpdateParams,
        options: &CallOptions,
    ) -> Result<RecordResult, DataError> {
        self.execute(&self.inner.pipelines.update, params, options, call_update)
            .await
    }

    pub async fn delete(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        self.delete_with(params, &CallOptions::default()).await
    }

    pub async fn delete_with(
        &self,
        params: DeleteParams,
        options: &CallOptions,
    ) -> Result<RecordResult, DataError> {
        self.execute(&self.inner.pipelines.delete, params, options, call_delete)
            .await
    }

    async fn execute<P, R>(
        &self,
        pipeline: &Pipeline<P, R>,
        params: P,
        options: &CallOptions,
        call: Call<P, R>,
    ) -> Result<R, DataError>
    where
        P: OperationParams + Clone + Send + Sync,
        R: Send,
    {
        let operation = P::OPERATION;
        let provider = self.provider();
        let span = tracing::info_span!(
            "crud",
            %operation,
            resource = %params.resource(),
            provider = provider.name(),
        );
        async move {
            if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                return Err(DataError::Cancelled {
                    operation,
                    resource: params.resource().to_string(),
                });
            }
            // After-hooks see the caller's params, not the chained ones.
            let original = params.clone();
            let chained = pipeline.run_before(params)?;
            let started = Instant::now();
            let outcome = self
                .guard(
                    operation,
                    chained.resource(),
                    options,
                    call(provider.as_ref(), chained.clone()),
                )
                .await;
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(result) => {
                    debug!(elapsed_ms, "provider call succeeded");
                    pipeline.run_after(result, &original)
                }
                Err(err) => {
                    debug!(elapsed_ms, error = %err, "provider call failed");
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Apply the effective deadline and the cancellation token to one
    /// provider call.
    async fn guard<R>(
        &self,
        operation: Operation,
        resource: &str,
        options: &CallOptions,
        call: ProviderFuture<'_, R>,
    ) -> Result<R, DataError> {
        let deadline = options.timeout.or(self.inner.default_timeout);
        let timed = async move {
            match deadline {
                Some(after) => match tokio::time::timeout(after, call).await {
                    Ok(result) => result,
                    Err(_) => Err(DataError::Timeout {
                        operation,
                        resource: resource.to_string(),
                        after,
                    }),
                },
                None => call.await,
            }
        };
        match &options.cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(DataError::Cancelled {
                    operation,
                    resource: resource.to_string(),
                }),
                result = timed => result,
            },
            None => timed.await,
        }
    }
}

impl std::fmt::Debug for CrudEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrudEngine")
            .field("provider", &self.provider().name())
            .field("plugins", &self.plugins())
            .field("default_locale", &self.inner.default_locale)
            .field("supported_locales", &self.inner.supported_locales)
            .field("default_timeout", &self.inner.default_timeout)
            .finish()
    }
}

/// Builder for [`CrudEngine`]. Plugins can only be attached here.
pub struct CrudEngineBuilder {
    provider: Arc<dyn CrudProvider>,
    plugins: Vec<Arc<dyn Plugin>>,
    enable_audit: bool,
    audit_reads: bool,
    audit_sink: Option<Arc<dyn AuditSink>>,
    enable_permissions: bool,
    permission_policy: Option<Arc<dyn PermissionPolicy>>,
    default_locale: String,
    supported_locales: Vec<String>,
    default_timeout: Option<Duration>,
}

impl CrudEngineBuilder {
    pub fn new(provider: Arc<dyn CrudProvider>) -> Self {
        Self {
            provider,
            plugins: Vec::new(),
            enable_audit: false,
            audit_reads: false,
            audit_sink: None,
            enable_permissions: false,
            permission_policy: None,
            default_locale: "en".to_string(),
            supported_locales: Vec::new(),
            default_timeout: None,
        }
    }

    /// Attach a plugin. Plugins run in the order they are attached, after
    /// the built-in permissions and audit plugins.
    pub fn plugin(mut self, plugin: impl Plugin) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn enable_audit(mut self, enabled: bool) -> Self {
        self.enable_audit = enabled;
        self
    }

    pub fn audit_reads(mut self, enabled: bool) -> Self {
        self.audit_reads = enabled;
        self
    }

    /// Destination of audit entries. Setting a sink enables auditing.
    pub fn audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self.enable_audit = true;
        self
    }

    pub fn enable_permissions(mut self, enabled: bool) -> Self {
        self.enable_permissions = enabled;
        self
    }

    /// Policy consulted before every call. Setting a policy enables
    /// permission checks.
    pub fn permission_policy(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.permission_policy = Some(policy);
        self.enable_permissions = true;
        self
    }

    pub fn default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = locale.into();
        self
    }

    pub fn supported_locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_locales = locales.into_iter().map(Into::into).collect();
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Validate the configuration, initialize every plugin once and
    /// assemble the hook pipelines.
    pub fn build(self) -> Result<CrudEngine, DataError> {
        if self.default_locale.trim().is_empty() {
            return Err(DataError::InvalidConfig("default locale is empty".into()));
        }
        let supported_locales = if self.supported_locales.is_empty() {
            vec![self.default_locale.clone()]
        } else {
            self.supported_locales
        };
        if !supported_locales.contains(&self.default_locale) {
            return Err(DataError::InvalidConfig(format!(
                "default locale '{}' is not among the supported locales [{}]",
                self.default_locale,
                supported_locales.join(", ")
            )));
        }
        if self.default_timeout.is_some_and(|t| t.is_zero()) {
            return Err(DataError::InvalidConfig("default timeout must be positive".into()));
        }

        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
        if self.enable_permissions {
            let policy = self
                .permission_policy
                .unwrap_or_else(|| Arc::new(AllowAll) as Arc<dyn PermissionPolicy>);
            plugins.push(Arc::new(PermissionsPlugin::new(policy)));
        }
        if self.enable_audit {
            let sink = self
                .audit_sink
                .unwrap_or_else(|| Arc::new(TracingAuditSink) as Arc<dyn AuditSink>);
            plugins.push(Arc::new(AuditPlugin::new(sink).include_reads(self.audit_reads)));
        }
        plugins.extend(self.plugins);

        let names: Vec<String> = plugins.iter().map(|p| p.name().to_string()).collect();
        for (idx, name) in names.iter().enumerate() {
            if names[..idx].contains(name) {
                return Err(DataError::InvalidConfig(format!(
                    "plugin '{name}' is registered twice"
                )));
            }
        }

        let ctx = EngineContext {
            provider: self.provider.clone(),
            default_locale: self.default_locale.clone(),
            supported_locales: supported_locales.clone(),
            plugins: names.clone(),
        };
        let mut pipelines = Pipelines::default();
        for plugin in &plugins {
            plugin.initialize(&ctx)?;
            pipelines.register(plugin.name(), plugin.hooks());
        }
        debug!(
            provider = self.provider.name(),
            plugins = ?names,
            before_get_list_stages = pipelines.get_list.len(),
            "crud engine built"
        );

        Ok(CrudEngine {
            inner: Arc::new(EngineInner {
                provider: RwLock::new(self.provider),
                plugins,
                pipelines,
                default_locale: self.default_locale,
                supported_locales,
                default_timeout: self.default_timeout,
            }),
        })
    }
}
