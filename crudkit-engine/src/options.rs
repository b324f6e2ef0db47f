use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Per-call execution options.
///
/// `timeout` overrides the engine's default deadline for this call. When
/// `cancel` fires, the in-flight provider call is dropped and the operation
/// fails with [`DataError::Cancelled`](crudkit_data::DataError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn cancel_on(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}
