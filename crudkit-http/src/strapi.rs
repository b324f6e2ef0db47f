//! Strapi v4 content API.
//!
//! Lists are requested as
//! `GET /api/{res}?filters[field][$op]=v&sort[0]=field:asc&pagination[page]=p&pagination[pageSize]=n`
//! and answered with `{ data: [{ id, attributes }], meta: { pagination: { total } } }`.
//! Entries are flattened to `{ id, ...attributes }`; flat v5 entries pass
//! through unchanged. Create and update bodies are wrapped as `{ data: {...} }`.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crudkit_data::{
    CreateParams, CrudProvider, DataError, DeleteParams, FilterOperator, GetOneParams, ListParams,
    ListResult, Operation, Pagination, ProviderFuture, Record, RecordId, RecordResult, UpdateParams,
};

use crate::client::{estimate_page, kind_of, scalar_text, Call, HttpClient, HttpConfig};

pub(crate) const PROVIDER: &str = "strapi";

fn default_api_prefix() -> String {
    "api".to_string()
}

fn default_page_size() -> u64 {
    25
}

/// Configuration of the Strapi provider.
///
/// ```yaml
/// type: strapi
/// config:
///   base_url: https://cms.example.com
///   auth: { type: bearer, token: "${STRAPI_TOKEN}" }
///   api_prefix: api
///   default_page_size: 25
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StrapiConfig {
    #[serde(flatten)]
    pub http: HttpConfig,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Page size requested when a list call has no pagination.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
}

impl StrapiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(base_url),
            api_prefix: default_api_prefix(),
            default_page_size: default_page_size(),
        }
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.http.validate(PROVIDER)?;
        if self.default_page_size == 0 {
            return Err(DataError::InvalidConfig(
                "strapi: default_page_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// [`CrudProvider`] over the Strapi v4 REST content API.
#[derive(Debug, Clone)]
pub struct StrapiProvider {
    client: HttpClient,
    config: StrapiConfig,
}

impl StrapiProvider {
    pub fn new(config: StrapiConfig) -> Result<Self, DataError> {
        config.validate()?;
        Ok(Self {
            client: HttpClient::new(PROVIDER, &config.http)?,
            config,
        })
    }

    fn collection_url(&self, resource: &str, id: Option<&RecordId>) -> Result<url::Url, DataError> {
        let path = self.client.resolve(resource)?;
        self.client.endpoint(&[self.config.api_prefix.as_str(), path], id)
    }

    async fn fetch(&self, call: Call<'_>, resource: &str, id: &RecordId) -> Result<Record, DataError> {
        let url = self.collection_url(resource, Some(id))?;
        let response = self.client.send(call, self.client.request(Method::GET, url)).await?;
        single_entry(call, id, response.body)
    }

    async fn list(&self, params: ListParams) -> Result<ListResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::GetList, resource);
        let query = list_query(&params, self.config.default_page_size)?;
        let url = self.collection_url(resource, None)?;
        let response = self
            .client
            .send(call, self.client.request(Method::GET, url).query(&query))
            .await?;

        let total = response.body.pointer("/meta/pagination/total").and_then(Value::as_u64);
        let items = match response.body.get("data") {
            Some(Value::Array(items)) => items.clone(),
            _ => return Err(call.error(PROVIDER, "response has no 'data' array").into()),
        };
        let data = items
            .into_iter()
            .map(|item| flatten(call, item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(match total {
            Some(total) => ListResult::exact(data, total),
            None => estimate_page(
                data,
                params
                    .pagination
                    .unwrap_or(Pagination::new(1, self.config.default_page_size)),
            ),
        })
    }

    async fn insert(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Create, resource);
        let url = self.collection_url(resource, None)?;
        let body = json!({ "data": without_id(&params.data) });
        let response = self
            .client
            .send(call, self.client.request(Method::POST, url).json(&body))
            .await?;
        match response.body.get("data").cloned() {
            Some(entry @ Value::Object(_)) => Ok(RecordResult::new(flatten(call, entry)?)),
            _ => Err(call.error(PROVIDER, "response has no 'data' object").into()),
        }
    }

    async fn modify(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Update, resource).with_id(&params.id);
        let url = self.collection_url(resource, Some(&params.id))?;
        let body = json!({ "data": without_id(&params.data) });
        let response = self
            .client
            .send(call, self.client.request(Method::PUT, url).json(&body))
            .await?;
        Ok(RecordResult::new(single_entry(call, &params.id, response.body)?))
    }

    async fn remove(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Delete, resource).with_id(&params.id);
        let prior = self.fetch(call, resource, &params.id).await?;
        let url = self.collection_url(resource, Some(&params.id))?;
        self.client.send(call, self.client.request(Method::DELETE, url)).await?;
        Ok(RecordResult::new(prior))
    }
}

fn without_id(data: &Record) -> Record {
    let mut data = data.clone();
    data.remove("id");
    data
}

/// `{ data: entry }` of a single-entry response; `data: null` is a miss.
fn single_entry(call: Call<'_>, id: &RecordId, body: Value) -> Result<Record, DataError> {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Null) | None => Err(DataError::not_found(call.resource, id.clone())),
            Some(entry) => flatten(call, entry),
        },
        other => Err(call
            .error(PROVIDER, format!("expected an object, got {}", kind_of(&other)))
            .into()),
    }
}

/// `{ id, attributes: {...} }` → `{ id, ... }`.
fn flatten(call: Call<'_>, entry: Value) -> Result<Record, DataError> {
    let mut map = match entry {
        Value::Object(map) => map,
        other => {
            return Err(call
                .error(PROVIDER, format!("expected an entry object, got {}", kind_of(&other)))
                .into())
        }
    };
    match map.remove("attributes") {
        Some(Value::Object(attributes)) => {
            let mut record = Record::from_map(attributes);
            if let Some(id) = map.remove("id") {
                record.insert("id".to_string(), id);
            }
            Ok(record)
        }
        Some(other) => {
            map.insert("attributes".to_string(), other);
            Ok(Record::from_map(map))
        }
        None => Ok(Record::from_map(map)),
    }
}

fn list_query(params: &ListParams, default_page_size: u64) -> Result<Vec<(String, String)>, DataError> {
    let resource = params.resource.as_str();
    let mut query = Vec::new();
    let page = params.pagination.unwrap_or(Pagination::new(1, default_page_size));
    page.validate()?;
    query.push(("pagination[page]".to_string(), page.page.to_string()));
    query.push(("pagination[pageSize]".to_string(), page.per_page.to_string()));
    if let Some(sort) = &params.sort {
        query.push(("sort[0]".to_string(), format!("{}:{}", sort.field, sort.order.as_str())));
    }

    for cond in params.filter.conditions() {
        let key = |op: &str| format!("filters[{}][{op}]", cond.field);
        let scalar = |value: &Value| {
            scalar_text(value).ok_or_else(|| {
                DataError::translation(
                    PROVIDER,
                    resource,
                    format!("filter on '{}' expects a scalar, got {}", cond.field, kind_of(value)),
                )
            })
        };
        match cond.operator {
            FilterOperator::Eq if cond.value.is_null() => query.push((key("$null"), "true".into())),
            FilterOperator::Ne if cond.value.is_null() => query.push((key("$notNull"), "true".into())),
            FilterOperator::Null => query.push((key("$null"), "true".into())),
            FilterOperator::NotNull => query.push((key("$notNull"), "true".into())),
            FilterOperator::In | FilterOperator::NotIn => {
                let op = if *cond.operator == FilterOperator::In { "$in" } else { "$notIn" };
                for (idx, item) in cond.list(PROVIDER, resource)?.iter().enumerate() {
                    query.push((format!("{}[{idx}]", key(op)), scalar(item)?));
                }
            }
            FilterOperator::Between => {
                let (low, high) = cond.range(PROVIDER, resource)?;
                query.push((format!("{}[0]", key("$between")), scalar(low)?));
                query.push((format!("{}[1]", key("$between")), scalar(high)?));
            }
            // Text matching is case-insensitive, as in the memory provider.
            FilterOperator::Contains | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                let op = match cond.operator {
                    FilterOperator::Contains => "$containsi",
                    FilterOperator::StartsWith => "$startsWithi",
                    _ => "$endsWithi",
                };
                query.push((key(op), cond.text(PROVIDER, resource)?));
            }
            FilterOperator::Other(_) => return Err(cond.unsupported(PROVIDER, resource)),
            simple => {
                let op = match simple {
                    FilterOperator::Eq => "$eq",
                    FilterOperator::Ne => "$ne",
                    FilterOperator::Lt => "$lt",
                    FilterOperator::Lte => "$lte",
                    FilterOperator::Gt => "$gt",
                    _ => "$gte",
                };
                query.push((key(op), scalar(cond.value)?));
            }
        }
    }
    Ok(query)
}

impl CrudProvider for StrapiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(self.list(params))
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move {
            let call = Call::new(Operation::GetOne, &params.resource).with_id(&params.id);
            let record = self.fetch(call, &params.resource, &params.id).await?;
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
