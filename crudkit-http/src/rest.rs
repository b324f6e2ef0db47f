//! Plain REST backends following the json-server conventions.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `get_list` | `GET /{res}?_page&_limit&_sort&_order&field=v&field_gte=v` |
//! | `get_one` | `GET /{res}/{id}` |
//! | `create` | `POST /{res}` |
//! | `update` | `PATCH /{res}/{id}` (or `PUT`, see [`UpdateMethod`]) |
//! | `delete_one` | `GET /{res}/{id}` then `DELETE /{res}/{id}` |
//!
//! The total comes from the `X-Total-Count` header or a `total` field next to
//! `data` in an enveloped body. Without either, a paginated list reports an
//! estimated total: a full page counts twice its length past the offset, a
//! short page ends the collection.
//!
//! Listed and created records must carry an `id`; a response without one is
//! a backend error.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crudkit_data::{
    CreateParams, CrudProvider, DataError, DeleteParams, Filter, FilterOperator, GetOneParams,
    ListParams, ListResult, Operation, ProviderFuture, Record, RecordId, RecordResult,
    UpdateParams,
};

use crate::client::{
    estimate_page, expect_identified, expect_record, kind_of, scalar_text, Call, HttpClient, HttpConfig,
};

pub(crate) const PROVIDER: &str = "rest";

fn default_total_header() -> String {
    "X-Total-Count".to_string()
}

/// HTTP verb used by `update`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMethod {
    /// Full replacement. The body is `previous_data` merged with `data` when
    /// a snapshot is available, `data` alone otherwise.
    Put,
    #[default]
    Patch,
}

/// Configuration of the REST provider.
///
/// ```yaml
/// type: rest
/// config:
///   base_url: https://api.example.com
///   auth: { type: bearer, token: "${API_TOKEN}" }
///   total_header: X-Total-Count
///   update_method: patch
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(flatten)]
    pub http: HttpConfig,
    #[serde(default = "default_total_header")]
    pub total_header: String,
    #[serde(default)]
    pub update_method: UpdateMethod,
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(base_url),
            total_header: default_total_header(),
            update_method: UpdateMethod::default(),
        }
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_total_header(mut self, header: impl Into<String>) -> Self {
        self.total_header = header.into();
        self
    }

    pub fn with_update_method(mut self, method: UpdateMethod) -> Self {
        self.update_method = method;
        self
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.http.validate(PROVIDER)?;
        if self.total_header.trim().is_empty() {
            return Err(DataError::InvalidConfig("rest: total_header is empty".into()));
        }
        Ok(())
    }
}

/// [`CrudProvider`] over a json-server style REST API.
#[derive(Debug, Clone)]
pub struct RestProvider {
    client: HttpClient,
    config: RestConfig,
}

impl RestProvider {
    pub fn new(config: RestConfig) -> Result<Self, DataError> {
        config.validate()?;
        Ok(Self {
            client: HttpClient::new(PROVIDER, &config.http)?,
            config,
        })
    }

    async fn fetch(&self, call: Call<'_>, path: &str, id: &RecordId) -> Result<Record, DataError> {
        let url = self.client.endpoint(&[path], Some(id))?;
        let response = self.client.send(call, self.client.request(Method::GET, url)).await?;
        let mut record = expect_record(PROVIDER, call, response.body)?;
        if record.id().is_none() {
            record.set_id(id);
        }
        Ok(record)
    }

    async fn list(&self, params: ListParams) -> Result<ListResult, DataError> {
        let resource = params.resource.as_str();
        let path = self.client.resolve(resource)?;
        let query = list_query(&params)?;
        if matches_nothing(&params.filter) {
            return Ok(ListResult::empty());
        }

        let call = Call::new(Operation::GetList, resource);
        let url = self.client.endpoint(&[path], None)?;
        let response = self
            .client
            .send(call, self.client.request(Method::GET, url).query(&query))
            .await?;
        let header_total = response
            .header(&self.config.total_header)
            .and_then(|v| v.trim().parse::<u64>().ok());

        let (items, body_total) = match response.body {
            Value::Array(items) => (items, None),
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => (items, map.get("total").and_then(Value::as_u64)),
                _ => {
                    return Err(call
                        .error(PROVIDER, "expected an array or an object with a 'data' array")
                        .into())
                }
            },
            other => {
                return Err(call
                    .error(PROVIDER, format!("expected an array, got {}", kind_of(&other)))
                    .into())
            }
        };
        let data = items
            .into_iter()
            .map(|item| expect_identified(PROVIDER, call, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(match (header_total.or(body_total), params.pagination) {
            (Some(total), _) => ListResult::exact(data, total),
            (None, None) => {
                let total = data.len() as u64;
                ListResult::exact(data, total)
            }
            (None, Some(page)) => estimate_page(data, page),
        })
    }

    async fn insert(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let path = self.client.resolve(resource)?;
        let call = Call::new(Operation::Create, resource);
        let url = self.client.endpoint(&[path], None)?;
        let response = self
            .client
            .send(call, self.client.request(Method::POST, url).json(&params.data))
            .await?;
        let mut record = expect_record(PROVIDER, call, response.body)?;
        // Some servers answer with the stored fields only.
        if let (None, Some(id)) = (record.id(), params.data.id()) {
            record.set_id(&id);
        }
        if record.id().is_none() {
            return Err(call.error(PROVIDER, "response has no id").into());
        }
        Ok(RecordResult::new(record))
    }

    async fn modify(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let path = self.client.resolve(resource)?;
        let call = Call::new(Operation::Update, resource).with_id(&params.id);
        let (method, body) = match self.config.update_method {
            UpdateMethod::Patch => (Method::PATCH, params.data.clone()),
            UpdateMethod::Put => {
                let mut body = params.previous_data.clone().unwrap_or_default();
                body.merge(&params.data);
                (Method::PUT, body)
            }
        };
        let url = self.client.endpoint(&[path], Some(&params.id))?;
        let response = self
            .client
            .send(call, self.client.request(method, url).json(&body))
            .await?;
        let mut record = expect_record(PROVIDER, call, response.body)?;
        if record.id().is_none() {
            record.set_id(&params.id);
        }
        Ok(RecordResult::new(record))
    }

    async fn remove(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let path = self.client.resolve(resource)?;
        let call = Call::new(Operation::Delete, resource).with_id(&params.id);
        let prior = self.fetch(call, path, &params.id).await?;
        let url = self.client.endpoint(&[path], Some(&params.id))?;
        self.client.send(call, self.client.request(Method::DELETE, url)).await?;
        Ok(RecordResult::new(prior))
    }
}

/// An `in` over an empty list matches no record.
fn matches_nothing(filter: &Filter) -> bool {
    filter.conditions().any(|cond| {
        *cond.operator == FilterOperator::In && matches!(cond.value, Value::Array(items) if items.is_empty())
    })
}

fn list_query(params: &ListParams) -> Result<Vec<(String, String)>, DataError> {
    let resource = params.resource.as_str();
    let mut query = Vec::new();
    if let Some(page) = &params.pagination {
        page.validate()?;
        query.push(("_page".to_string(), page.page.to_string()));
        query.push(("_limit".to_string(), page.per_page.to_string()));
    }
    if let Some(sort) = &params.sort {
        query.push(("_sort".to_string(), sort.field.clone()));
        query.push(("_order".to_string(), sort.order.as_str().to_string()));
    }

    for cond in params.filter.conditions() {
        let suffix = match cond.operator {
            FilterOperator::Eq if cond.value.is_null() => return Err(cond.unsupported(PROVIDER, resource)),
            FilterOperator::Eq => "",
            FilterOperator::Ne => "_ne",
            FilterOperator::Lt => "_lt",
            FilterOperator::Lte => "_lte",
            FilterOperator::Gt => "_gt",
            FilterOperator::Gte => "_gte",
            FilterOperator::Contains => {
                let needle = escape_regex(&cond.text(PROVIDER, resource)?);
                query.push((format!("{}_like", cond.field), needle));
                continue;
            }
            FilterOperator::In => {
                for item in cond.list(PROVIDER, resource)? {
                    query.push((cond.field.to_string(), scalar(item, cond.field, resource)?));
                }
                continue;
            }
            _ => return Err(cond.unsupported(PROVIDER, resource)),
        };
        query.push((
            format!("{}{suffix}", cond.field),
            scalar(cond.value, cond.field, resource)?,
        ));
    }
    Ok(query)
}

fn scalar(value: &Value, field: &str, resource: &str) -> Result<String, DataError> {
    scalar_text(value).ok_or_else(|| {
        DataError::translation(
            PROVIDER,
            resource,
            format!("filter on '{field}' expects a scalar, got {}", kind_of(value)),
        )
    })
}

/// `_like` takes a regular expression; match the needle literally.
fn escape_regex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl CrudProvider for RestProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(self.list(params))
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move {
            let path = self.client.resolve(&params.resource)?;
            let call = Call::new(Operation::GetOne, &params.resource).with_id(&params.id);
            let record = self.fetch(call, path, &params.id).await?;
            Ok(RecordResult::new(record))
        })
    }

    fn create(&self, params: CreateParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(self.insert(params))
    }

    fn update(&self, params: UpdateParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(self.modify(params))
    }

    fn delete_one(&self, params: DeleteParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(self.remove(params))
    }
}
