use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install a console `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Returns `false`
/// when a global subscriber was already installed (the call is then a no-op),
/// so tests and applications can both call it.
pub fn init_tracing(format: LogFormat) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE);
            Registry::default().with(env_filter).with(fmt_layer).try_init()
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false);
            Registry::default().with(env_filter).with(fmt_layer).try_init()
        }
    };
    installed.is_ok()
}
