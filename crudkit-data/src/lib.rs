pub mod error;
pub mod filter;
pub mod memory;
pub mod page;
pub mod params;
pub mod provider;
pub mod query;
pub mod record;
pub mod resource;

pub use error::{BackendError, DataError};
pub use filter::{Condition, Filter, FilterOperator, FilterValue};
pub use memory::{MemoryConfig, MemoryProvider};
pub use page::{ListResult, Pagination, Sort, SortOrder};
pub use params::{
    CreateParams, DeleteParams, GetOneParams, ListParams, Meta, Operation, OperationParams,
    RecordResult, UpdateParams,
};
pub use provider::{CrudProvider, ProviderFuture};
pub use query::{Dialect, IdentifierPolicy, QueryBuilder, QueryError};
pub use record::{Record, RecordId};
pub use resource::ResourceMap;

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        CreateParams, CrudProvider, DataError, DeleteParams, Filter, FilterOperator, GetOneParams,
        ListParams, ListResult, Record, RecordId, RecordResult, Sort, SortOrder, UpdateParams,
    };
}
