//! Hasura-style GraphQL backends.
//!
//! Each resource maps to a table exposing the usual generated root fields:
//! `{t}(where, order_by, limit, offset)`, `{t}_aggregate`, `{t}_by_pk`,
//! `insert_{t}_one`, `update_{t}_by_pk` and `delete_{t}_by_pk`. GraphQL has
//! no "select everything", so the selected fields are configured per
//! resource; `id` is always selected.

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::trace;

use crudkit_data::query::escape_like;
use crudkit_data::{
    CreateParams, CrudProvider, DataError, DeleteParams, Filter, FilterOperator, GetOneParams,
    ListParams, ListResult, Operation, ProviderFuture, Record, RecordId, RecordResult,
    UpdateParams,
};

use crate::client::{estimate_page, expect_record, kind_of, Call, HttpClient, HttpConfig};

pub(crate) const PROVIDER: &str = "graphql";

fn default_id_type() -> String {
    "Int".to_string()
}

/// Selection and key type of one resource.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResource {
    pub fields: Vec<String>,
    /// GraphQL type of the primary key (`Int`, `uuid`, `String`, ...).
    #[serde(default = "default_id_type")]
    pub id_type: String,
}

impl GraphqlResource {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            id_type: default_id_type(),
        }
    }

    pub fn with_id_type(mut self, id_type: impl Into<String>) -> Self {
        self.id_type = id_type.into();
        self
    }

    fn selection(&self) -> String {
        let mut fields: Vec<&str> = vec!["id"];
        fields.extend(self.fields.iter().map(String::as_str).filter(|f| *f != "id"));
        fields.join(" ")
    }

    fn id_variable(&self, id: &RecordId) -> Value {
        let integral = matches!(self.id_type.as_str(), "Int" | "bigint" | "smallint" | "Int!");
        match (integral, id.as_i64()) {
            (true, Some(n)) => Value::from(n),
            _ => id.to_value(),
        }
    }
}

/// Configuration of the GraphQL provider.
///
/// ```yaml
/// type: graphql
/// config:
///   base_url: https://hasura.example.com/v1/graphql
///   headers: { x-hasura-admin-secret: "${HASURA_SECRET}" }
///   schema:
///     articles:
///       fields: [title, body, views]
///     tags:
///       fields: [label]
///       id_type: uuid
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlConfig {
    /// `base_url` is the GraphQL endpoint itself.
    #[serde(flatten)]
    pub http: HttpConfig,
    #[serde(default)]
    pub schema: HashMap<String, GraphqlResource>,
}

impl GraphqlConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: HttpConfig::new(endpoint),
            schema: HashMap::new(),
        }
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>, schema: GraphqlResource) -> Self {
        self.schema.insert(resource.into(), schema);
        self
    }

    pub fn validate(&self) -> Result<(), DataError> {
        self.http.validate(PROVIDER)?;
        for (resource, schema) in &self.schema {
            if schema.fields.is_empty() {
                return Err(DataError::InvalidConfig(format!(
                    "graphql: resource '{resource}' selects no fields"
                )));
            }
            let id_type = schema.id_type.trim_end_matches('!');
            if let Some(bad) = schema
                .fields
                .iter()
                .map(String::as_str)
                .chain([id_type])
                .find(|name| !is_graphql_name(name))
            {
                return Err(DataError::InvalidConfig(format!(
                    "graphql: '{bad}' in resource '{resource}' is not a GraphQL name"
                )));
            }
        }
        Ok(())
    }
}

/// [`CrudProvider`] over a Hasura-style GraphQL API.
#[derive(Debug, Clone)]
pub struct GraphqlProvider {
    client: HttpClient,
    config: GraphqlConfig,
}

impl GraphqlProvider {
    pub fn new(config: GraphqlConfig) -> Result<Self, DataError> {
        config.validate()?;
        Ok(Self {
            client: HttpClient::new(PROVIDER, &config.http)?,
            config,
        })
    }

    /// Table name and schema of a resource.
    fn target<'a>(&'a self, resource: &'a str) -> Result<(&'a str, &'a GraphqlResource), DataError> {
        let table = self.client.resolve(resource)?;
        let schema = self.config.schema.get(resource);
        match schema {
            Some(schema) if is_graphql_name(table) => Ok((table, schema)),
            _ => Err(DataError::unsupported_resource(PROVIDER, resource)),
        }
    }

    /// Run one document and return its `data` object.
    async fn execute(&self, call: Call<'_>, document: String, variables: Value) -> Result<Map<String, Value>, DataError> {
        trace!(provider = PROVIDER, document = %document, "graphql document");
        let url = self.client.endpoint(&[], None)?;
        let body = json!({ "query": document, "variables": variables });
        let response = self
            .client
            .send(call, self.client.request(Method::POST, url).json(&body))
            .await?;
        let status = response.status.as_u16();
        let mut body = response.body;

        if let Some(errors) = body.get("errors").and_then(Value::as_array).filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.get("message").and_then(Value::as_str).unwrap_or("unknown error"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(call.error(PROVIDER, message).with_status(status).into());
        }
        match body.get_mut("data").map(Value::take) {
            Some(Value::Object(data)) => Ok(data),
            _ => Err(call.error(PROVIDER, "response has no 'data' object").into()),
        }
    }

    /// Run a `record: ...` document whose `null` answer means the id is unknown.
    async fn execute_single(
        &self,
        call: Call<'_>,
        id: Option<&RecordId>,
        document: String,
        variables: Value,
    ) -> Result<Record, DataError> {
        let mut data = self.execute(call, document, variables).await?;
        match (data.remove("record"), id) {
            (Some(Value::Null) | None, Some(id)) => Err(DataError::not_found(call.resource, id.clone())),
            (Some(record), _) => expect_record(PROVIDER, call, record),
            (None, None) => Err(call.error(PROVIDER, "response has no 'record' field").into()),
        }
    }

    async fn list(&self, params: ListParams) -> Result<ListResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::GetList, resource);
        let (table, schema) = self.target(resource)?;
        let where_clause = where_clause(&params.filter, resource)?;

        let mut variables = json!({ "where": where_clause });
        if let Some(sort) = &params.sort {
            if !is_graphql_name(&sort.field) {
                return Err(DataError::translation(
                    PROVIDER,
                    resource,
                    format!("cannot sort on '{}'", sort.field),
                ));
            }
            let direction = if sort.order.is_asc() { "asc_nulls_last" } else { "desc_nulls_last" };
            let mut order = Map::new();
            order.insert(sort.field.clone(), json!(direction));
            variables["order_by"] = json!([order]);
        }
        if let Some(page) = &params.pagination {
            page.validate()?;
            variables["limit"] = json!(page.limit());
            variables["offset"] = json!(page.offset());
        }

        let document = format!(
            "query GetList($where: {table}_bool_exp, $order_by: [{table}_order_by!], $limit: Int, $offset: Int) {{ \
             items: {table}(where: $where, order_by: $order_by, limit: $limit, offset: $offset) {{ {selection} }} \
             total: {table}_aggregate(where: $where) {{ aggregate {{ count }} }} }}",
            selection = schema.selection()
        );
        let mut data = self.execute(call, document, variables).await?;

        let items = match data.remove("items") {
            Some(Value::Array(items)) => items,
            other => {
                let got = other.as_ref().map(kind_of).unwrap_or("nothing");
                return Err(call.error(PROVIDER, format!("expected an 'items' array, got {got}")).into());
            }
        };
        let records = items
            .into_iter()
            .map(|item| expect_record(PROVIDER, call, item))
            .collect::<Result<Vec<_>, _>>()?;
        let total = data
            .get("total")
            .and_then(|t| t.pointer("/aggregate/count"))
            .and_then(Value::as_u64);
        Ok(match total {
            Some(total) => ListResult::exact(records, total),
            None => match params.pagination {
                Some(page) => estimate_page(records, page),
                None => {
                    let total = records.len() as u64;
                    ListResult::estimated(records, total)
                }
            },
        })
    }

    async fn fetch(&self, params: GetOneParams) -> Result<RecordResult, DataError> {
        let call = Call::new(Operation::GetOne, &params.resource).with_id(&params.id);
        self.fetch_as(call, &params.id).await
    }

    /// Read one row by key, reporting failures under `call`.
    async fn fetch_as(&self, call: Call<'_>, id: &RecordId) -> Result<RecordResult, DataError> {
        let (table, schema) = self.target(call.resource)?;
        let document = format!(
            "query GetOne($id: {id_type}!) {{ record: {table}_by_pk(id: $id) {{ {selection} }} }}",
            id_type = schema.id_type.trim_end_matches('!'),
            selection = schema.selection()
        );
        let variables = json!({ "id": schema.id_variable(id) });
        let record = self.execute_single(call, Some(id), document, variables).await?;
        Ok(RecordResult::new(record))
    }

    async fn insert(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Create, resource);
        let (table, schema) = self.target(resource)?;
        let document = format!(
            "mutation Create($object: {table}_insert_input!) {{ record: insert_{table}_one(object: $object) {{ {selection} }} }}",
            selection = schema.selection()
        );
        let variables = json!({ "object": params.data });
        let record = self.execute_single(call, None, document, variables).await?;
        Ok(RecordResult::new(record))
    }

    async fn modify(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Update, resource).with_id(&params.id);
        let mut changes = params.data.clone();
        changes.remove("id");
        // Nothing to set: answer with the current row.
        if changes.is_empty() {
            return self.fetch_as(call, &params.id).await;
        }

        let (table, schema) = self.target(resource)?;
        let document = format!(
            "mutation Update($id: {id_type}!, $set: {table}_set_input!) {{ \
             record: update_{table}_by_pk(pk_columns: {{ id: $id }}, _set: $set) {{ {selection} }} }}",
            id_type = schema.id_type.trim_end_matches('!'),
            selection = schema.selection()
        );
        let variables = json!({ "id": schema.id_variable(&params.id), "set": changes });
        let record = self.execute_single(call, Some(&params.id), document, variables).await?;
        Ok(RecordResult::new(record))
    }

    async fn remove(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let call = Call::new(Operation::Delete, resource).with_id(&params.id);
        let (table, schema) = self.target(resource)?;
        // delete_*_by_pk answers with the removed row.
        let document = format!(
            "mutation Delete($id: {id_type}!) {{ record: delete_{table}_by_pk(id: $id) {{ {selection} }} }}",
            id_type = schema.id_type.trim_end_matches('!'),
            selection = schema.selection()
        );
        let variables = json!({ "id": schema.id_variable(&params.id) });
        let record = self.execute_single(call, Some(&params.id), document, variables).await?;
        Ok(RecordResult::new(record))
    }
}

fn is_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Translate a filter into a Hasura `*_bool_exp` object.
fn where_clause(filter: &Filter, resource: &str) -> Result<Value, DataError> {
    let mut clause = Map::new();
    for cond in filter.conditions() {
        if !is_graphql_name(cond.field) {
            return Err(DataError::translation(
                PROVIDER,
                resource,
                format!("'{}' is not a GraphQL field name", cond.field),
            ));
        }
        let value = cond.value.clone();
        let ops: Vec<(&str, Value)> = match cond.operator {
            FilterOperator::Eq if value.is_null() => vec![("_is_null", json!(true))],
            FilterOperator::Ne if value.is_null() => vec![("_is_null", json!(false))],
            FilterOperator::Eq => vec![("_eq", value)],
            FilterOperator::Ne => vec![("_neq", value)],
            FilterOperator::Lt => vec![("_lt", value)],
            FilterOperator::Lte => vec![("_lte", value)],
            FilterOperator::Gt => vec![("_gt", value)],
            FilterOperator::Gte => vec![("_gte", value)],
            FilterOperator::Contains => {
                vec![("_ilike", json!(format!("%{}%", escape_like(&cond.text(PROVIDER, resource)?))))]
            }
            FilterOperator::StartsWith => {
                vec![("_ilike", json!(format!("{}%", escape_like(&cond.text(PROVIDER, resource)?))))]
            }
            FilterOperator::EndsWith => {
                vec![("_ilike", json!(format!("%{}", escape_like(&cond.text(PROVIDER, resource)?))))]
            }
            FilterOperator::In => vec![("_in", Value::Array(cond.list(PROVIDER, resource)?.to_vec()))],
            FilterOperator::NotIn => vec![("_nin", Value::Array(cond.list(PROVIDER, resource)?.to_vec()))],
            FilterOperator::Null => vec![("_is_null", json!(true))],
            FilterOperator::NotNull => vec![("_is_null", json!(false))],
            FilterOperator::Between => {
                let (low, high) = cond.range(PROVIDER, resource)?;
                vec![("_gte", low.clone()), ("_lte", high.clone())]
            }
            FilterOperator::Other(_) => return Err(cond.unsupported(PROVIDER, resource)),
        };
        let comparison: Map<String, Value> = ops.into_iter().map(|(op, v)| (op.to_string(), v)).collect();
        clause.insert(cond.field.to_string(), Value::Object(comparison));
    }
    Ok(Value::Object(clause))
}

impl CrudProvider for GraphqlProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(self.list(params))
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(self.fetch(params))
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
