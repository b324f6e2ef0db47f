//! Airtable REST API.
//!
//! Airtable only pages through opaque `offset` cursors. Page `n` is reached
//! by requesting page 1 and following the real cursors `n - 1` times, so
//! deep pages cost one request per preceding page. Airtable never reports a
//! match count: `total` is exact once the last page has been seen and an
//! estimate (`total_estimated`) otherwise.

use std::collections::HashSet;

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crudkit_data::{
    CreateParams, CrudProvider, DataError, DeleteParams, Filter, FilterOperator, GetOneParams,
    ListParams, ListResult, Operation, ProviderFuture, Record, RecordId, RecordResult,
    UpdateParams,
};

use crate::client::{kind_of, Call, HttpClient, HttpConfig};

pub(crate) const PROVIDER: &str = "airtable";

/// Largest page Airtable serves.
pub const MAX_PAGE_SIZE: u64 = 100;

pub const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

fn default_page_size() -> u64 {
    MAX_PAGE_SIZE
}

/// Configuration of the Airtable provider.
///
/// ```yaml
/// type: airtable
/// config:
///   base_url: https://api.airtable.com/v0
///   base_id: appXXXXXXXXXXXXXX
///   auth: { type: bearer, token: "${AIRTABLE_TOKEN}" }
///   resources:
///     mapping: { customers: "Customers" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AirtableConfig {
    #[serde(flatten)]
    pub http: HttpConfig,
    pub base_id: String,
    /// Page size used to walk every page when a list call has no pagination.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl AirtableConfig {
    pub fn new(base_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(DEFAULT_BASE_URL).with_auth(crate::client::Auth::bearer(token)),
            base_id: base_id.into(),
            page_size: default_page_size(),
        }
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.http.validate(PROVIDER)?;
        if self.http.auth.is_none() {
            return Err(DataError::InvalidConfig("airtable: auth is required".into()));
        }
        if self.base_id.trim().is_empty() || self.base_id.contains(['/', '?', '#']) {
            return Err(DataError::InvalidConfig(format!(
                "airtable: invalid base_id '{}'",
                self.base_id
            )));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(DataError::InvalidConfig(format!(
                "airtable: page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// [`CrudProvider`] over one Airtable base.
#[derive(Debug, Clone)]
pub struct AirtableProvider {
    client: HttpClient,
    config: AirtableConfig,
}

struct Page {
    records: Vec<Record>,
    next: Option<String>,
}

impl AirtableProvider {
    pub fn new(config: AirtableConfig) -> Result<Self, DataError> {
        config.validate()?;
        Ok(Self {
            client: HttpClient::new(PROVIDER, &config.http)?,
            config,
        })
    }

    fn table_url(&self, resource: &str, id: Option<&RecordId>) -> Result<url::Url, DataError> {
        let table = self.client.resolve(resource)?;
        self.client.endpoint(&[self.config.base_id.as_str(), table], id)
    }

    async fn fetch_page(
        &self,
        call: Call<'_>,
        query: &[(String, String)],
        cursor: Option<&str>,
    ) -> Result<Page, DataError> {
        let url = self.table_url(call.resource, None)?;
        let mut request = self.client.request(Method::GET, url).query(query);
        if let Some(cursor) = cursor {
            request = request.query(&[("offset", cursor)]);
        }
        let response = self.client.send(call, request).await?;
        let records = match response.body.get("records") {
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .map(|item| flatten(call, item))
                .collect::<Result<Vec<_>, _>>()?,
            _ => return Err(call.error(PROVIDER, "response has no 'records' array").into()),
        };
        let next = response
            .body
            .get("offset")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(Page { records, next })
    }

    async fn list(&self, params: ListParams) -> Result<ListResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::GetList, resource);
        let per_page = match &params.pagination {
            Some(page) => {
                page.validate()?;
                if page.per_page > MAX_PAGE_SIZE {
                    return Err(DataError::InvalidParams(format!(
                        "airtable serves at most {MAX_PAGE_SIZE} records per page"
                    )));
                }
                page.per_page
            }
            None => self.config.page_size,
        };

        let mut query = vec![("pageSize".to_string(), per_page.to_string())];
        if let Some(formula) = formula(&params.filter, resource)? {
            query.push(("filterByFormula".to_string(), formula));
        }
        if let Some(sort) = &params.sort {
            query.push(("sort[0][field]".to_string(), sort.field.clone()));
            query.push(("sort[0][direction]".to_string(), sort.order.as_str().to_string()));
        }

        let target = params.pagination.map(|p| p.page);
        let mut cursor: Option<String> = None;
        let mut followed = HashSet::new();
        let mut seen = Vec::new();
        let mut before = 0u64;
        let mut current = 1u64;
        loop {
            let page = self.fetch_page(call, &query, cursor.as_deref()).await?;
            let returned = page.records.len() as u64;
            // A cursor handed out twice would page forever.
            if let (Some(next), false) = (&page.next, target == Some(current)) {
                if !followed.insert(next.clone()) {
                    return Err(call
                        .error(PROVIDER, format!("offset cursor '{next}' repeated"))
                        .into());
                }
            }
            match (target, page.next) {
                // Requested page reached.
                (Some(target), next) if current == target => {
                    return Ok(match next {
                        Some(_) => ListResult::estimated(page.records, before + 2 * returned),
                        None => ListResult::exact(page.records, before + returned),
                    });
                }
                // Walking everything.
                (None, next) => {
                    seen.extend(page.records);
                    match next {
                        Some(next) => cursor = Some(next),
                        None => {
                            let total = seen.len() as u64;
                            return Ok(ListResult::exact(seen, total));
                        }
                    }
                }
                // Ran out of cursors before the requested page.
                (Some(_), None) => return Ok(ListResult::exact(Vec::new(), before + returned)),
                (Some(_), Some(next)) => cursor = Some(next),
            }
            before += returned;
            current += 1;
            debug!(provider = PROVIDER, resource, page = current, "following cursor");
        }
    }

    async fn fetch(&self, call: Call<'_>, id: &RecordId) -> Result<Record, DataError> {
        let url = self.table_url(call.resource, Some(id))?;
        let response = self.client.send(call, self.client.request(Method::GET, url)).await?;
        flatten(call, response.body)
    }

    async fn insert(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        let call = Call::new(Operation::Create, &params.resource);
        let url = self.table_url(&params.resource, None)?;
        let body = json!({ "fields": fields_of(&params.data) });
        let response = self
            .client
            .send(call, self.client.request(Method::POST, url).json(&body))
            .await?;
        Ok(RecordResult::new(flatten(call, response.body)?))
    }

    async fn modify(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        let call = Call::new(Operation::Update, &params.resource).with_id(&params.id);
        let url = self.table_url(&params.resource, Some(&params.id))?;
        let body = json!({ "fields": fields_of(&params.data) });
        let response = self
            .client
            .send(call, self.client.request(Method::PATCH, url).json(&body))
            .await?;
        Ok(RecordResult::new(flatten(call, response.body)?))
    }

    async fn remove(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        let call = Call::new(Operation::Delete, &params.resource).with_id(&params.id);
        let prior = self.fetch(call, &params.id).await?;
        let url = self.table_url(&params.resource, Some(&params.id))?;
        self.client.send(call, self.client.request(Method::DELETE, url)).await?;
        Ok(RecordResult::new(prior))
    }
}

fn fields_of(data: &Record) -> Record {
    let mut fields = data.clone();
    fields.remove("id");
    fields
}

/// `{ id, fields: {...} }` → `{ id, ... }`.
fn flatten(call: Call<'_>, item: Value) -> Result<Record, DataError> {
    let mut map = match item {
        Value::Object(map) => map,
        other => {
            return Err(call
                .error(PROVIDER, format!("expected a record object, got {}", kind_of(&other)))
                .into())
        }
    };
    let mut record = match map.remove("fields") {
        Some(Value::Object(fields)) => Record::from_map(fields),
        _ => Record::new(),
    };
    match map.remove("id") {
        Some(id @ Value::String(_)) => {
            record.insert("id".to_string(), id);
            Ok(record)
        }
        _ => Err(call.error(PROVIDER, "record has no string 'id'").into()),
    }
}

/// Translate a filter into an Airtable formula, `None` when there is nothing to filter.
fn formula(filter: &Filter, resource: &str) -> Result<Option<String>, DataError> {
    let mut parts = Vec::with_capacity(filter.len());
    for cond in filter.conditions() {
        if cond.field.contains(['{', '}']) {
            return Err(DataError::translation(
                PROVIDER,
                resource,
                format!("'{}' cannot be used in a formula", cond.field),
            ));
        }
        let field = format!("{{{}}}", cond.field);
        let lit = |value: &Value| literal(value, cond.field, resource);
        let part = match cond.operator {
            FilterOperator::Null => format!("{field} = BLANK()"),
            FilterOperator::NotNull => format!("NOT({field} = BLANK())"),
            FilterOperator::Eq if cond.value.is_null() => format!("{field} = BLANK()"),
            FilterOperator::Ne if cond.value.is_null() => format!("NOT({field} = BLANK())"),
            FilterOperator::Eq => format!("{field} = {}", lit(cond.value)?),
            FilterOperator::Ne => format!("{field} != {}", lit(cond.value)?),
            FilterOperator::Lt => format!("{field} < {}", lit(cond.value)?),
            FilterOperator::Lte => format!("{field} <= {}", lit(cond.value)?),
            FilterOperator::Gt => format!("{field} > {}", lit(cond.value)?),
            FilterOperator::Gte => format!("{field} >= {}", lit(cond.value)?),
            FilterOperator::Contains => {
                let needle = quote(&cond.text(PROVIDER, resource)?);
                format!("FIND(LOWER({needle}), LOWER({field})) > 0")
            }
            FilterOperator::StartsWith => {
                let needle = quote(&cond.text(PROVIDER, resource)?);
                format!("FIND(LOWER({needle}), LOWER({field})) = 1")
            }
            FilterOperator::EndsWith => {
                let needle = quote(&cond.text(PROVIDER, resource)?);
                format!("RIGHT(LOWER({field}), LEN({needle})) = LOWER({needle})")
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let items = cond.list(PROVIDER, resource)?;
                let negated = *cond.operator == FilterOperator::NotIn;
                if items.is_empty() {
                    if negated { "TRUE()".to_string() } else { "FALSE()".to_string() }
                } else {
                    let alternatives = items
                        .iter()
                        .map(|item| Ok(format!("{field} = {}", lit(item)?)))
                        .collect::<Result<Vec<_>, DataError>>()?;
                    let any = format!("OR({})", alternatives.join(", "));
                    if negated { format!("NOT({any})") } else { any }
                }
            }
            FilterOperator::Between => {
                let (low, high) = cond.range(PROVIDER, resource)?;
                format!("AND({field} >= {}, {field} <= {})", lit(low)?, lit(high)?)
            }
            FilterOperator::Other(_) => return Err(cond.unsupported(PROVIDER, resource)),
        };
        parts.push(part);
    }
    Ok(match parts.len() {
        0 => None,
        1 => parts.pop(),
        _ => Some(format!("AND({})", parts.join(", "))),
    })
}

/// Single-quoted formula string literal.
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn literal(value: &Value, field: &str, resource: &str) -> Result<String, DataError> {
    match value {
        Value::String(s) => Ok(quote(s)),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(true) => Ok("TRUE()".to_string()),
        Value::Bool(false) => Ok("FALSE()".to_string()),
        Value::Null => Ok("BLANK()".to_string()),
        other => Err(DataError::translation(
            PROVIDER,
            resource,
            format!("filter on '{field}' expects a scalar, got {}", kind_of(other)),
        )),
    }
}

impl CrudProvider for AirtableProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(self.list(params))
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move {
            let call = Call::new(Operation::GetOne, &params.resource).with_id(&params.id);
            Ok(RecordResult::new(self.fetch(call, &params.id).await?))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crudkit_data::record;

    fn formula_of(filter: Filter) -> Option<String> {
        formula(&filter, "t").unwrap()
    }

    #[test]
    fn empty_filter_has_no_formula() {
        assert_eq!(formula_of(Filter::new()), None);
    }

    #[test]
    fn single_condition_is_not_wrapped() {
        assert_eq!(
            formula_of(Filter::new().eq("Name", "O'Hara")),
            Some("{Name} = 'O\\'Hara'".to_string())
        );
    }

    #[test]
    fn combined_operators() {
        let filter = Filter::new()
            .op("Age", FilterOperator::Between, json!([18, 30]))
            .op("Status", FilterOperator::NotIn, json!(["lost", "closed"]))
            .op("Email", FilterOperator::Null, Value::Null)
            .op("Active", FilterOperator::Eq, true);
        assert_eq!(
            formula_of(filter).unwrap(),
            "AND({Active} = TRUE(), AND({Age} >= 18, {Age} <= 30), {Email} = BLANK(), \
             NOT(OR({Status} = 'lost', {Status} = 'closed')))"
        );
    }

    #[test]
    fn text_operators_ignore_case() {
        assert_eq!(
            formula_of(Filter::new().op("Name", FilterOperator::Contains, "ad")).unwrap(),
            "FIND(LOWER('ad'), LOWER({Name})) > 0"
        );
    }

    #[test]
    fn empty_in_lists() {
        assert_eq!(
            formula_of(Filter::new().op("Tag", FilterOperator::In, json!([]))),
            Some("FALSE()".to_string())
        );
        assert_eq!(
            formula_of(Filter::new().op("Tag", FilterOperator::NotIn, json!([]))),
            Some("TRUE()".to_string())
        );
    }

    #[test]
    fn braces_in_field_names_are_rejected() {
        assert!(formula(&Filter::new().eq("a}b", 1), "t").is_err());
        assert!(formula(&Filter::new().op("a", FilterOperator::Other("regex".into()), 1), "t").is_err());
    }

    #[test]
    fn records_are_flattened() {
        let call = Call::new(Operation::GetOne, "people");
        let item = json!({ "id": "rec1", "createdTime": "2024-01-01T00:00:00.000Z", "fields": { "Name": "Ada" } });
        assert_eq!(flatten(call, item).unwrap(), record! { "id": "rec1", "Name": "Ada" });
        assert!(flatten(call, json!({ "fields": {} })).is_err());
    }

    #[test]
    fn config_validation() {
        assert!(AirtableConfig::new("appX", "tok").validate().is_ok());
        assert!(AirtableConfig::new("", "tok").validate().is_err());
        assert!(AirtableConfig::new("appX", "tok").with_page_size(101).validate().is_err());
        let mut anonymous = AirtableConfig::new("appX", "tok");
        anonymous.http.auth = None;
        assert!(anonymous.validate().is_err());
    }
}
