//! In-memory [`CrudProvider`].
//!
//! Each resource is an ordered `Vec<Record>` inside a [`DashMap`] shard, so
//! the provider is safe to share across tasks. Cloning a [`MemoryProvider`]
//! yields another handle onto the same state.

use dashmap::DashMap;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{BackendError, DataError};
use crate::filter::{Condition, Filter, FilterOperator};
use crate::page::{ListResult, Sort};
use crate::params::{
    CreateParams, DeleteParams, GetOneParams, ListParams, Operation, RecordResult, UpdateParams,
};
use crate::provider::{CrudProvider, ProviderFuture};
use crate::record::{Record, RecordId};
use crate::resource::ResourceMap;

const PROVIDER: &str = "memory";

/// Configuration of the in-memory provider.
///
/// ```yaml
/// type: memory
/// config:
///   resources:
///     strict: true
///     mapping: { orders: orders }
///   seed:
///     orders:
///       - { id: 1, status: open }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub resources: ResourceMap,
    /// Initial records per logical resource.
    #[serde(default)]
    pub seed: HashMap<String, Vec<Record>>,
}

#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
    next_id: i64,
}

impl Collection {
    fn position(&self, id: &RecordId) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.id().is_some_and(|rid| same_id(&rid, id)))
    }

    /// Insert a record, assigning the next integer id when it has none.
    fn insert(&mut self, mut record: Record) -> Result<Record, String> {
        let id = match record.id() {
            Some(id) => {
                if self.position(&id).is_some() {
                    return Err(format!("a record with id {id} already exists"));
                }
                id
            }
            None => {
                let id = RecordId::Int(self.next_id.max(1));
                record.set_id(&id);
                id
            }
        };
        if let RecordId::Int(n) = id {
            self.next_id = self.next_id.max(n + 1);
        }
        self.records.push(record.clone());
        Ok(record)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: DashMap<String, Collection>,
    resources: ResourceMap,
}

/// A `CrudProvider` keeping every resource in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    state: Arc<MemoryState>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resources(resources: ResourceMap) -> Self {
        Self {
            state: Arc::new(MemoryState {
                collections: DashMap::new(),
                resources,
            }),
        }
    }

    /// Build a provider from its configuration, loading seed records.
    pub fn from_config(config: MemoryConfig) -> Result<Self, DataError> {
        let provider = Self::with_resources(config.resources);
        for (resource, records) in config.seed {
            provider.try_seed(&resource, records)?;
        }
        Ok(provider)
    }

    /// Append records to a resource. Records without an `id` get one.
    ///
    /// Panics if a seeded id is duplicated or the resource is rejected by a
    /// strict mapping; use [`MemoryProvider::try_seed`] to handle that.
    pub fn seed(&self, resource: &str, records: impl IntoIterator<Item = Record>) -> &Self {
        if let Err(err) = self.try_seed(resource, records) {
            panic!("invalid seed for '{resource}': {err}");
        }
        self
    }

    pub fn try_seed(
        &self,
        resource: &str,
        records: impl IntoIterator<Item = Record>,
    ) -> Result<(), DataError> {
        let key = self.state.resources.resolve(PROVIDER, resource)?.to_string();
        let mut collection = self.state.collections.entry(key).or_default();
        for record in records {
            collection.insert(record).map_err(|message| {
                DataError::InvalidConfig(format!("seed for '{resource}': {message}"))
            })?;
        }
        Ok(())
    }

    /// Number of records currently stored for `resource`.
    pub fn len(&self, resource: &str) -> usize {
        let key = self.key(resource).unwrap_or_else(|_| resource.to_string());
        self.state
            .collections
            .get(&key)
            .map(|c| c.records.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, resource: &str) -> bool {
        self.len(resource) == 0
    }

    /// Drop every record of every resource.
    pub fn clear(&self) {
        self.state.collections.clear();
    }

    fn key(&self, resource: &str) -> Result<String, DataError> {
        Ok(self.state.resources.resolve(PROVIDER, resource)?.to_string())
    }

    fn list_now(&self, params: &ListParams) -> Result<ListResult, DataError> {
        let key = self.key(&params.resource)?;
        if let Some(pagination) = &params.pagination {
            pagination.validate()?;
        }
        let predicates = compile_filter(&params.filter, &params.resource)?;

        let mut rows: Vec<Record> = match self.state.collections.get(&key) {
            Some(collection) => collection
                .records
                .iter()
                .filter(|r| predicates.iter().all(|p| p.matches(r)))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        if let Some(sort) = &params.sort {
            sort_records(&mut rows, sort);
        }
        let total = rows.len() as u64;
        let data = match &params.pagination {
            Some(p) => rows
                .into_iter()
                .skip(usize::try_from(p.offset()).unwrap_or(usize::MAX))
                .take(usize::try_from(p.limit()).unwrap_or(usize::MAX))
                .collect(),
            None => rows,
        };
        debug!(provider = PROVIDER, resource = %params.resource, total, returned = data.len(), "getList");
        Ok(ListResult::exact(data, total))
    }

    fn get_now(&self, resource: &str, id: &RecordId) -> Result<Record, DataError> {
        let key = self.key(resource)?;
        self.state
            .collections
            .get(&key)
            .and_then(|c| c.position(id).map(|i| c.records[i].clone()))
            .ok_or_else(|| DataError::not_found(resource, id.clone()))
    }

    fn create_now(&self, params: CreateParams) -> Result<Record, DataError> {
        let key = self.key(&params.resource)?;
        let mut collection = self.state.collections.entry(key).or_default();
        let created = collection.insert(params.data).map_err(|message| {
            BackendError::new(PROVIDER, Operation::Create, &params.resource, message).with_status(409)
        })?;
        debug!(provider = PROVIDER, resource = %params.resource, id = ?created.id(), "create");
        Ok(created)
    }

    fn update_now(&self, params: UpdateParams) -> Result<Record, DataError> {
        let key = self.key(&params.resource)?;
        let not_found = || DataError::not_found(&params.resource, params.id.clone());
        let mut collection = self.state.collections.get_mut(&key).ok_or_else(not_found)?;
        let idx = collection.position(&params.id).ok_or_else(not_found)?;
        let record = &mut collection.records[idx];
        let id = record.id().unwrap_or_else(|| params.id.clone());
        record.merge(&params.data);
        // The identifier is immutable through update.
        record.set_id(&id);
        debug!(provider = PROVIDER, resource = %params.resource, id = %params.id, "update");
        Ok(record.clone())
    }

    fn delete_now(&self, params: &DeleteParams) -> Result<Record, DataError> {
        let key = self.key(&params.resource)?;
        let not_found = || DataError::not_found(&params.resource, params.id.clone());
        let mut collection = self.state.collections.get_mut(&key).ok_or_else(not_found)?;
        let idx = collection.position(&params.id).ok_or_else(not_found)?;
        let removed = collection.records.remove(idx);
        debug!(provider = PROVIDER, resource = %params.resource, id = %params.id, "delete");
        Ok(removed)
    }
}

impl CrudProvider for MemoryProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(async move { self.list_now(&params) })
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move { self.get_now(&params.resource, &params.id).map(RecordResult::new) })
    }

    fn create(&self, params: CreateParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move { self.create_now(params).map(RecordResult::new) })
    }

    fn update(&self, params: UpdateParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move { self.update_now(params).map(RecordResult::new) })
    }

    fn delete_one(&self, params: DeleteParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move { self.delete_now(&params).map(RecordResult::new) })
    }
}

fn same_id(a: &RecordId, b: &RecordId) -> bool {
    a == b || matches!((a.as_i64(), b.as_i64()), (Some(x), Some(y)) if x == y)
}

#[derive(Debug, Clone, Copy)]
enum TextMatch {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug)]
enum Predicate<'a> {
    Eq(&'a str, &'a Value),
    Ne(&'a str, &'a Value),
    Cmp(&'a str, &'a Value, fn(Ordering) -> bool),
    Text(&'a str, TextMatch, String),
    In(&'a str, &'a [Value]),
    NotIn(&'a str, &'a [Value]),
    Null(&'a str),
    NotNull(&'a str),
    Between(&'a str, &'a Value, &'a Value),
}

/// Validate every condition up front so a bad filter fails even on an empty
/// collection.
fn compile_filter<'a>(filter: &'a Filter, resource: &str) -> Result<Vec<Predicate<'a>>, DataError> {
    filter
        .conditions()
        .map(|cond| compile_condition(cond, resource))
        .collect()
}

fn compile_condition<'a>(cond: Condition<'a>, resource: &str) -> Result<Predicate<'a>, DataError> {
    let field = cond.field;
    Ok(match cond.operator {
        FilterOperator::Eq => Predicate::Eq(field, cond.value),
        FilterOperator::Ne => Predicate::Ne(field, cond.value),
        FilterOperator::Lt => Predicate::Cmp(field, cond.value, Ordering::is_lt),
        FilterOperator::Lte => Predicate::Cmp(field, cond.value, Ordering::is_le),
        FilterOperator::Gt => Predicate::Cmp(field, cond.value, Ordering::is_gt),
        FilterOperator::Gte => Predicate::Cmp(field, cond.value, Ordering::is_ge),
        FilterOperator::Contains => {
            Predicate::Text(field, TextMatch::Contains, cond.text(PROVIDER, resource)?.to_lowercase())
        }
        FilterOperator::StartsWith => {
            Predicate::Text(field, TextMatch::StartsWith, cond.text(PROVIDER, resource)?.to_lowercase())
        }
        FilterOperator::EndsWith => {
            Predicate::Text(field, TextMatch::EndsWith, cond.text(PROVIDER, resource)?.to_lowercase())
        }
        FilterOperator::In => Predicate::In(field, cond.list(PROVIDER, resource)?),
        FilterOperator::NotIn => Predicate::NotIn(field, cond.list(PROVIDER, resource)?),
        FilterOperator::Null => Predicate::Null(field),
        FilterOperator::NotNull => Predicate::NotNull(field),
        FilterOperator::Between => {
            let (lo, hi) = cond.range(PROVIDER, resource)?;
            Predicate::Between(field, lo, hi)
        }
        FilterOperator::Other(_) => return Err(cond.unsupported(PROVIDER, resource)),
    })
}

impl Predicate<'_> {
    fn matches(&self, record: &Record) -> bool {
        let get = |field: &str| record.get(field).filter(|v| !v.is_null());
        match self {
            Predicate::Eq(f, expected) => loose_eq(get(f), expected),
            // Absent and null fields never match `ne`/`notIn`, as in SQL.
            Predicate::Ne(f, expected) => get(f).is_some_and(|v| !loose_eq(Some(v), expected)),
            Predicate::Cmp(f, operand, accept) => get(f)
                .and_then(|v| compare_values(v, operand))
                .is_some_and(accept),
            Predicate::Text(f, kind, needle) => {
                let Some(value) = get(f) else { return false };
                if let Value::Array(items) = value {
                    return items
                        .iter()
                        .filter_map(value_text)
                        .any(|t| text_matches(&t.to_lowercase(), *kind, needle));
                }
                value_text(value).is_some_and(|t| text_matches(&t.to_lowercase(), *kind, needle))
            }
            Predicate::In(f, values) => values.iter().any(|v| loose_eq(get(f), v)),
            Predicate::NotIn(f, values) => {
                values.is_empty() || get(f).is_some_and(|v| !values.iter().any(|e| loose_eq(Some(v), e)))
            }
            Predicate::Null(f) => get(f).is_none(),
            Predicate::NotNull(f) => get(f).is_some(),
            Predicate::Between(f, lo, hi) => get(f).is_some_and(|v| {
                compare_values(v, lo).is_some_and(Ordering::is_ge)
                    && compare_values(v, hi).is_some_and(Ordering::is_le)
            }),
        }
    }
}

fn text_matches(haystack: &str, kind: TextMatch, needle: &str) -> bool {
    match kind {
        TextMatch::Contains => haystack.contains(needle),
        TextMatch::StartsWith => haystack.starts_with(needle),
        TextMatch::EndsWith => haystack.ends_with(needle),
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equality treating `null` and a missing field alike and `5 == 5.0`.
fn loose_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        None => expected.is_null(),
        Some(v) => v == expected || compare_values(v, expected) == Some(Ordering::Equal),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Order two JSON values. Numbers compare numerically, also against numeric
/// strings; otherwise only values of the same kind are comparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            as_number(a)?.partial_cmp(&as_number(b)?)
        }
        _ => None,
    }
}

fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Stable single-field sort; null or missing values go last in both directions.
fn sort_records(rows: &mut [Record], sort: &Sort) {
    rows.sort_by(|a, b| {
        let va = a.get(&sort.field).filter(|v| !v.is_null());
        let vb = b.get(&sort.field).filter(|v| !v.is_null());
        match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y).unwrap_or_else(|| kind_rank(x).cmp(&kind_rank(y)));
                if sort.order.is_asc() {
                    ord
                } else {
                    ord.reverse()
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::SortOrder;
    use crate::record;
    use serde_json::json;

    fn seeded() -> MemoryProvider {
        let provider = MemoryProvider::new();
        provider.seed(
            "items",
            vec![
                record! { "id": 1, "name": "a", "qty": 5 },
                record! { "id": 2, "name": "b", "qty": 10 },
                record! { "id": 3, "name": "c", "qty": 15 },
            ],
        );
        provider
    }

    fn ids(result: &ListResult) -> Vec<RecordId> {
        result.data.iter().filter_map(Record::id).collect()
    }

    #[tokio::test]
    async fn sorted_first_page() {
        let provider = seeded();
        let result = provider
            .get_list(
                ListParams::new("items")
                    .sort_by("qty", SortOrder::Desc)
                    .paginate(1, 2),
            )
            .await
            .unwrap();
        assert_eq!(ids(&result), vec![RecordId::Int(3), RecordId::Int(2)]);
        assert_eq!(result.total, 3);
        assert!(!result.total_estimated);
    }

    #[tokio::test]
    async fn missing_pagination_returns_all_rows() {
        let result = seeded().get_list(ListParams::new("items")).await.unwrap();
        assert_eq!(result.data.len(), 3);
        assert_eq!(result.total, 3);
    }

    #[tokio::test]
    async fn unknown_resource_is_an_empty_list() {
        let result = seeded().get_list(ListParams::new("nothing")).await.unwrap();
        assert_eq!(result, ListResult::exact(vec![], 0));
    }

    #[tokio::test]
    async fn operators() {
        let provider = seeded();
        let cases = vec![
            (Filter::new().eq("name", "b"), vec![2]),
            (Filter::new().op("qty", FilterOperator::Gt, 5), vec![2, 3]),
            (Filter::new().op("qty", FilterOperator::Lte, "10"), vec![1, 2]),
            (Filter::new().op("qty", FilterOperator::Between, json!([6, 15])), vec![2, 3]),
            (Filter::new().op("name", FilterOperator::In, json!(["a", "c"])), vec![1, 3]),
            (Filter::new().op("name", FilterOperator::NotIn, json!(["a"])), vec![2, 3]),
            (Filter::new().op("name", FilterOperator::Contains, "B"), vec![2]),
            (Filter::new().op("name", FilterOperator::Ne, "a"), vec![2, 3]),
            (Filter::new().op("missing", FilterOperator::Ne, "a"), vec![]),
            (Filter::new().op("missing", FilterOperator::NotIn, json!(["a"])), vec![]),
            (Filter::new().op("missing", FilterOperator::Null, json!(null)), vec![1, 2, 3]),
            (Filter::new().op("name", FilterOperator::NotNull, json!(null)), vec![1, 2, 3]),
        ];
        for (filter, expected) in cases {
            let result = provider
                .get_list(ListParams::new("items").filter(filter.clone()))
                .await
                .unwrap();
            let expected: Vec<_> = expected.into_iter().map(RecordId::Int).collect();
            assert_eq!(ids(&result), expected, "filter {filter:?}");
        }
    }

    #[tokio::test]
    async fn unknown_operator_is_rejected_even_without_rows() {
        let provider = MemoryProvider::new();
        let filter = Filter::new().op("name", FilterOperator::Other("regex".into()), "^a");
        let err = provider
            .get_list(ListParams::new("items").filter(filter))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Translation { .. }));
    }

    #[tokio::test]
    async fn nulls_sort_last_both_ways() {
        let provider = MemoryProvider::new();
        provider.seed(
            "t",
            vec![
                record! { "id": 1, "rank": null },
                record! { "id": 2, "rank": 2 },
                record! { "id": 3 },
                record! { "id": 4, "rank": 1 },
            ],
        );
        for (order, expected) in [(SortOrder::Asc, [4, 2, 1, 3]), (SortOrder::Desc, [2, 4, 1, 3])] {
            let result = provider
                .get_list(ListParams::new("t").sort_by("rank", order))
                .await
                .unwrap();
            let expected: Vec<_> = expected.into_iter().map(RecordId::Int).collect();
            assert_eq!(ids(&result), expected);
        }
    }

    #[tokio::test]
    async fn create_assigns_monotonic_ids() {
        let provider = seeded();
        let first = provider
            .create(CreateParams::new("items", record! { "name": "d" }))
            .await
            .unwrap();
        assert_eq!(first.data.id(), Some(RecordId::Int(4)));
        provider
            .delete_one(DeleteParams::new("items", 4))
            .await
            .unwrap();
        let second = provider
            .create(CreateParams::new("items", record! { "name": "e" }))
            .await
            .unwrap();
        assert_eq!(second.data.id(), Some(RecordId::Int(5)));
    }

    #[tokio::test]
    async fn create_rejects_duplicate_ids() {
        let err = seeded()
            .create(CreateParams::new("items", record! { "id": 1 }))
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Backend(ref b) if b.status == Some(409)));
    }

    #[tokio::test]
    async fn update_merges_and_keeps_id() {
        let provider = seeded();
        let updated = provider
            .update(UpdateParams::new("items", 2, record! { "id": 99, "qty": 11 }))
            .await
            .unwrap();
        assert_eq!(updated.data, record! { "id": 2, "name": "b", "qty": 11 });
        let fetched = provider.get_one(GetOneParams::new("items", "2")).await.unwrap();
        assert_eq!(fetched.data, updated.data);
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let provider = seeded();
        assert!(provider
            .get_one(GetOneParams::new("items", 42))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(provider
            .update(UpdateParams::new("items", 42, Record::new()))
            .await
            .unwrap_err()
            .is_not_found());
        assert!(provider
            .delete_one(DeleteParams::new("other", 1))
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn strict_mapping_rejects_unmapped_resources() {
        let provider =
            MemoryProvider::with_resources(ResourceMap::new().map("orders", "tbl_orders").strict(true));
        provider.seed("orders", vec![record! { "total": 1 }]);
        assert_eq!(provider.len("orders"), 1);
        let err = provider.get_list(ListParams::new("users")).await.unwrap_err();
        assert!(matches!(err, DataError::UnsupportedResource { .. }));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let provider = seeded();
        let other = provider.clone();
        other
            .delete_one(DeleteParams::new("items", 1))
            .await
            .unwrap();
        assert_eq!(provider.len("items"), 2);
    }

    #[test]
    fn config_seeds_records() {
        let config: MemoryConfig = serde_json::from_value(json!({
            "seed": { "posts": [{ "title": "x" }, { "id": 10, "title": "y" }] }
        }))
        .unwrap();
        let provider = MemoryProvider::from_config(config).unwrap();
        assert_eq!(provider.len("posts"), 2);
    }
}
