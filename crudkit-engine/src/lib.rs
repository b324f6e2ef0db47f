pub mod engine;
pub mod hooks;
pub mod options;
pub mod plugin;
pub mod plugins;
pub mod settings;
pub mod tracing_setup;

pub use engine::{CrudEngine, CrudEngineBuilder};
pub use hooks::{AfterFn, BeforeFn, Hooks, OperationHooks};
pub use options::CallOptions;
pub use plugin::{EngineContext, Plugin};
pub use plugins::audit::{AuditEntry, AuditPlugin, AuditSink, LogLevel, MemoryAuditSink, TracingAuditSink};
pub use plugins::permissions::{AllowAll, PermissionPolicy, PermissionsPlugin, RolePolicy};
pub use settings::EngineSettings;
pub use tokio_util::sync::CancellationToken;
pub use tracing_setup::{init_tracing, LogFormat};

pub mod prelude {
    //! Re-exports of the most commonly used engine types.
    pub use crate::{CallOptions, CrudEngine, Hooks, Plugin};
}
