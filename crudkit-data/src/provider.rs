//! The provider contract every backend adapter implements.
//!
//! [`CrudProvider`] is object-safe so that the engine and the registry can
//! hold `Arc<dyn CrudProvider>` and never branch on adapter identity.
//!
//! Provided implementations in this crate:
//! - [`MemoryProvider`](crate::memory::MemoryProvider): in-memory provider for tests

use std::future::Future;
use std::pin::Pin;

use crate::error::DataError;
use crate::page::ListResult;
use crate::params::{CreateParams, DeleteParams, GetOneParams, ListParams, RecordResult, UpdateParams};

/// Boxed future returned by provider operations.
pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DataError>> + Send + 'a>>;

/// Five-operation CRUD contract over one backend.
///
/// Implementations translate the shared parameter model into the backend's
/// wire protocol and normalize responses back into [`ListResult`] /
/// [`RecordResult`]. They must:
///
/// - raise [`DataError::NotFound`] when the target of `get_one`, `update` or
///   `delete_one` does not exist,
/// - raise [`DataError::Translation`] for filter constructs they cannot
///   express, never drop them,
/// - return `{ data: [], total: 0 }` for an empty match, not an error,
/// - return the pre-deletion record from `delete_one`.
///
/// A provider may own a connection pool shared by concurrent calls; any
/// mutual exclusion is the implementation's business.
pub trait CrudProvider: Send + Sync + 'static {
    /// Short identifier used in logs and errors (e.g. `"rest"`).
    fn name(&self) -> &'static str;

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult>;

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult>;

    fn create(&self, params: CreateParams) -> ProviderFuture<'_, RecordResult>;

    fn update(&self, params: UpdateParams) -> ProviderFuture<'_, RecordResult>;

    fn delete_one(&self, params: DeleteParams) -> ProviderFuture<'_, RecordResult>;
}
