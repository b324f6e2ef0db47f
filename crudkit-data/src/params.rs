use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::Filter;
use crate::page::{Pagination, Sort, SortOrder};
use crate::record::{Record, RecordId};

/// Free-form call metadata (actor, role, locale, tracing ids). Providers
/// ignore it; plugins read it.
pub type Meta = Map<String, Value>;

/// The five operations of the CRUD contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    #[serde(rename = "getList")]
    GetList,
    #[serde(rename = "getOne")]
    GetOne,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::GetList,
        Operation::GetOne,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::GetList => "getList",
            Operation::GetOne => "getOne",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, Operation::Create | Operation::Update | Operation::Delete)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of `get_list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListParams {
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
    #[serde(default, skip_serializing_if = "Filter::is_empty")]
    pub filter: Filter,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Meta,
}

impl ListParams {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn paginate(mut self, page: u64, per_page: u64) -> Self {
        self.pagination = Some(Pagination::new(page, per_page));
        self
    }

    pub fn sort_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            field: field.into(),
            order,
        });
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Parameters of `get_one`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOneParams {
    pub resource: String,
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Meta,
}

impl GetOneParams {
    pub fn new(resource: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Parameters of `create`. An `id` inside `data` is honoured when the
/// backend accepts caller-chosen ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    pub resource: String,
    pub data: Record,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Meta,
}

impl CreateParams {
    pub fn new(resource: impl Into<String>, data: Record) -> Self {
        Self {
            resource: resource.into(),
            data,
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Parameters of `update`. `data` holds the changed fields only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub resource: String,
    pub id: RecordId,
    pub data: Record,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_data: Option<Record>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Meta,
}

impl UpdateParams {
    pub fn new(resource: impl Into<String>, id: impl Into<RecordId>, data: Record) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
            data,
            previous_data: None,
            meta: Meta::new(),
        }
    }

    pub fn previous(mut self, previous: Record) -> Self {
        self.previous_data = Some(previous);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Parameters of `delete_one`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteParams {
    pub resource: String,
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub meta: Meta,
}

impl DeleteParams {
    pub fn new(resource: impl Into<String>, id: impl Into<RecordId>) -> Self {
        Self {
            resource: resource.into(),
            id: id.into(),
            meta: Meta::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

/// Result of `get_one`, `create`, `update` and `delete_one`.
///
/// `data` is never absent on success: a missing record is
/// [`DataError::NotFound`](crate::DataError::NotFound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordResult {
    pub data: Record,
}

impl RecordResult {
    pub fn new(data: Record) -> Self {
        Self { data }
    }
}

/// Access to the fields every params struct shares.
pub trait OperationParams {
    const OPERATION: Operation;

    fn resource(&self) -> &str;
    fn meta(&self) -> &Meta;
    fn record_id(&self) -> Option<&RecordId> {
        None
    }
}

impl OperationParams for ListParams {
    const OPERATION: Operation = Operation::GetList;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

impl OperationParams for GetOneParams {
    const OPERATION: Operation = Operation::GetOne;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn record_id(&self) -> Option<&RecordId> {
        Some(&self.id)
    }
}

impl OperationParams for CreateParams {
    const OPERATION: Operation = Operation::Create;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

impl OperationParams for UpdateParams {
    const OPERATION: Operation = Operation::Update;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn record_id(&self) -> Option<&RecordId> {
        Some(&self.id)
    }
}

impl OperationParams for DeleteParams {
    const OPERATION: Operation = Operation::Delete;

    fn resource(&self) -> &str {
        &self.resource
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }

    fn record_id(&self) -> Option<&RecordId> {
        Some(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOperator;
    use serde_json::json;

    #[test]
    fn list_params_from_wire_shape() {
        let params: ListParams = serde_json::from_value(json!({
            "resource": "orders",
            "pagination": {"page": 2, "perPage": 20},
            "sort": {"field": "createdAt", "order": "desc"},
            "filter": {"status": "open", "total": {"operator": "gt", "value": 100}},
        }))
        .unwrap();
        assert_eq!(params.pagination, Some(Pagination::new(2, 20)));
        assert_eq!(params.sort, Some(Sort::desc("createdAt")));
        let ops: Vec<_> = params.filter.conditions().map(|c| c.operator.clone()).collect();
        assert_eq!(ops, vec![FilterOperator::Eq, FilterOperator::Gt]);
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::GetList.to_string(), "getList");
        assert_eq!(serde_json::to_value(Operation::Delete).unwrap(), json!("delete"));
        assert!(Operation::Update.is_mutation());
        assert!(!Operation::GetOne.is_mutation());
    }

    #[test]
    fn params_expose_common_fields() {
        let p = UpdateParams::new("orders", 3, Record::new()).with_meta("role", "admin");
        assert_eq!(p.resource(), "orders");
        assert_eq!(p.record_id(), Some(&RecordId::Int(3)));
        assert_eq!(p.meta().get("role"), Some(&json!("admin")));
        assert_eq!(<UpdateParams as OperationParams>::OPERATION, Operation::Update);
    }
}
