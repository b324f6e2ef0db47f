//! # crudkit-http: HTTP backends for crudkit
//!
//! [`CrudProvider`](crudkit_data::CrudProvider) implementations over remote
//! HTTP APIs, built on a shared [`HttpClient`] (`reqwest`) that handles base
//! URLs, authentication, timeouts and status → [`DataError`](crudkit_data::DataError)
//! mapping.
//!
//! # What's in this crate
//!
//! | Type | Backend |
//! |------|---------|
//! | [`RestProvider`] | json-server style REST (`_page`, `_limit`, `_sort`, `X-Total-Count`) |
//! | [`StrapiProvider`] | Strapi v4/v5 content API (`filters[..][$op]`, `meta.pagination`) |
//! | [`GraphqlProvider`] | Hasura style GraphQL (`where`, `order_by`, `_aggregate`) |
//! | [`AirtableProvider`] | Airtable REST API (`filterByFormula`, cursor paging) |
//!
//! Every provider is built from a serde config that flattens [`HttpConfig`]:
//!
//! ```yaml
//! base_url: https://api.example.com
//! timeout_ms: 10000
//! auth: { type: bearer, token: "${API_TOKEN}" }
//! headers: { Accept-Language: en }
//! resources:
//!   mapping: { customers: crm/contacts }
//! ```
//!
//! # Errors
//!
//! | Response | Error |
//! |----------|-------|
//! | `404` on a call addressing one record | `DataError::NotFound` |
//! | Any other non-2xx | `DataError::Backend` carrying the status (`5xx` and `429` are retryable) |
//! | Transport failure or timeout | `DataError::Backend` without status (retryable) |
//! | Filter the backend cannot express | `DataError::Translation` |
//!
//! # Quick start
//!
//! ```no_run
//! use crudkit_data::prelude::*;
//! use crudkit_http::{Auth, HttpConfig, RestConfig, RestProvider};
//!
//! # async fn run() -> Result<(), DataError> {
//! let base_url = "https://jsonplaceholder.typicode.com";
//! let config = RestConfig::new(base_url)
//!     .with_http(HttpConfig::new(base_url).with_auth(Auth::bearer("t0ken")));
//! let provider = RestProvider::new(config)?;
//! let posts = provider.get_list(ListParams::new("posts").paginate(1, 10)).await?;
//! println!("{} posts (~{})", posts.data.len(), posts.total);
//! # Ok(())
//! # }
//! ```

pub mod airtable;
pub mod client;
pub mod graphql;
pub mod rest;
pub mod strapi;

pub use airtable::{AirtableConfig, AirtableProvider};
pub use client::{Auth, HttpClient, HttpConfig};
pub use graphql::{GraphqlConfig, GraphqlProvider, GraphqlResource};
pub use rest::{RestConfig, RestProvider, UpdateMethod};
pub use strapi::{StrapiConfig, StrapiProvider};

/// Re-exports of the most commonly used types from both `crudkit-data` and this crate.
pub mod prelude {
    pub use crate::{
        AirtableConfig, AirtableProvider, Auth, GraphqlConfig, GraphqlProvider, GraphqlResource,
        HttpConfig, RestConfig, RestProvider, StrapiConfig, StrapiProvider,
    };
    pub use crudkit_data::prelude::*;
}
