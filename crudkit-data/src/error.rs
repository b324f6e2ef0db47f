use std::time::Duration;

use crate::params::Operation;
use crate::record::RecordId;

/// Failure reported by the backend behind a provider (non-success HTTP
/// status, GraphQL `errors`, driver error, undecodable response).
#[derive(Debug)]
pub struct BackendError {
    pub provider: &'static str,
    pub operation: Operation,
    pub resource: String,
    pub id: Option<RecordId>,
    /// HTTP status or driver-specific code, when the backend exposes one.
    pub status: Option<u16>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    pub fn new(
        provider: &'static str,
        operation: Operation,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            operation,
            resource: resource.into(),
            id: None,
            status: None,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_id(mut self, id: Option<RecordId>) -> Self {
        self.id = id;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, err: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(err));
        self
    }
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} backend failed on {} {}",
            self.provider, self.operation, self.resource
        )?;
        if let Some(id) = &self.id {
            write!(f, "/{id}")?;
        }
        if let Some(status) = self.status {
            write!(f, " (status {status})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Errors that can occur in the data layer.
///
/// Every variant carries enough context (resource, id, operation, backend
/// message) for a caller to decide between showing a message, retrying or
/// aborting. Nothing in this layer retries on its own.
#[derive(Debug)]
pub enum DataError {
    /// The factory was given a provider type tag it does not know.
    UnsupportedProviderType {
        given: String,
        supported: Vec<&'static str>,
    },
    /// The provider has no mapping for the requested resource.
    UnsupportedResource {
        provider: &'static str,
        resource: String,
    },
    /// The target record of a `get_one`/`update`/`delete` does not exist.
    NotFound { resource: String, id: RecordId },
    /// A filter or sort construct cannot be expressed in the backend's
    /// query language.
    Translation {
        provider: &'static str,
        resource: String,
        message: String,
    },
    Backend(BackendError),
    /// Malformed call parameters (page 0, missing id, non-object payload).
    InvalidParams(String),
    InvalidConfig(String),
    PermissionDenied {
        operation: Operation,
        resource: String,
        reason: String,
    },
    /// A plugin hook failed for a reason other than a denied permission.
    Hook { plugin: String, message: String },
    Timeout {
        operation: Operation,
        resource: String,
        after: Duration,
    },
    Cancelled {
        operation: Operation,
        resource: String,
    },
}

impl DataError {
    pub fn not_found(resource: impl Into<String>, id: impl Into<RecordId>) -> Self {
        DataError::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    pub fn translation(
        provider: &'static str,
        resource: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DataError::Translation {
            provider,
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn unsupported_resource(provider: &'static str, resource: impl Into<String>) -> Self {
        DataError::UnsupportedResource {
            provider,
            resource: resource.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DataError::NotFound { .. })
    }

    /// Whether a caller-side retry has a reasonable chance of succeeding.
    ///
    /// Transport failures without a status, 429 and 5xx responses, and
    /// timeouts are retryable. Everything else indicates a caller or
    /// configuration problem.
    pub fn is_retryable(&self) -> bool {
        match self {
            DataError::Backend(err) => match err.status {
                None => true,
                Some(status) => status == 429 || (500..600).contains(&status),
            },
            DataError::Timeout { .. } => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::UnsupportedProviderType { given, supported } => write!(
                f,
                "Unsupported provider type '{given}' (expected one of: {})",
                supported.join(", ")
            ),
            DataError::UnsupportedResource { provider, resource } => {
                write!(f, "Resource '{resource}' is not supported by the {provider} provider")
            }
            DataError::NotFound { resource, id } => write!(f, "Not found: {resource}/{id}"),
            DataError::Translation {
                provider,
                resource,
                message,
            } => write!(f, "Cannot translate query on '{resource}' for {provider}: {message}"),
            DataError::Backend(err) => write!(f, "{err}"),
            DataError::InvalidParams(msg) => write!(f, "Invalid parameters: {msg}"),
            DataError::InvalidConfig(msg) => write!(f, "Invalid provider config: {msg}"),
            DataError::PermissionDenied {
                operation,
                resource,
                reason,
            } => write!(f, "Permission denied for {operation} on '{resource}': {reason}"),
            DataError::Hook { plugin, message } => write!(f, "Plugin '{plugin}' failed: {message}"),
            DataError::Timeout {
                operation,
                resource,
                after,
            } => write!(
                f,
                "{operation} on '{resource}' timed out after {}ms",
                after.as_millis()
            ),
            DataError::Cancelled {
                operation,
                resource,
            } => write!(f, "{operation} on '{resource}' was cancelled"),
        }
    }
}

impl std::error::Error for DataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DataError::Backend(BackendError {
                source: Some(err), ..
            }) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<BackendError> for DataError {
    fn from(err: BackendError) -> Self {
        DataError::Backend(err)
    }
}
