use serde_json::Value;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::AnyPool;
use tracing::debug;

use crudkit_data::{
    BackendError, CreateParams, CrudProvider, DataError, DeleteParams, Dialect, Filter,
    FilterOperator, GetOneParams, IdentifierPolicy, ListParams, ListResult, Operation,
    ProviderFuture, QueryBuilder, Record, RecordId, RecordResult, UpdateParams,
};

use crate::config::SqlConfig;
use crate::error::{query_error, SqlxErrorExt};
use crate::row::{bind_values, decode_row, decode_value, expose_id, hide_id};

pub(crate) const PROVIDER: &str = "sql";

/// [`CrudProvider`] over a relational database through the `sqlx` Any driver.
///
/// Resources map to tables. Filters and sorts become parameterized SQL, so
/// field names are validated and quoted before they reach a statement.
///
/// `ne` follows SQL semantics: rows where the field is NULL never match.
#[derive(Debug, Clone)]
pub struct SqlProvider {
    pool: AnyPool,
    dialect: Dialect,
    config: SqlConfig,
}

impl SqlProvider {
    /// Build a provider with a lazily connecting pool.
    ///
    /// No connection is opened here, but the pool spawns its maintenance
    /// task, so this must run inside a Tokio runtime.
    pub fn new(config: SqlConfig) -> Result<Self, DataError> {
        config.validate()?;
        sqlx::any::install_default_drivers();

        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout());
        if config.is_in_memory_sqlite() {
            // Every connection would open its own empty database.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options
            .connect_lazy(&config.url)
            .map_err(|e| DataError::InvalidConfig(format!("sql: {e}")))?;
        Ok(Self::with_pool(pool, config))
    }

    /// Wrap an existing pool. The dialect is still derived from `config.url`.
    pub fn with_pool(pool: AnyPool, config: SqlConfig) -> Self {
        Self {
            pool,
            dialect: config.dialect(),
            config,
        }
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn table<'a>(&'a self, resource: &'a str) -> Result<&'a str, DataError> {
        self.config.resources.resolve(PROVIDER, resource)
    }

    fn builder(&self, table: &str) -> QueryBuilder {
        QueryBuilder::new_with_dialect(table, self.dialect).identifier_policy(IdentifierPolicy::Quote)
    }

    async fn fetch_row(
        &self,
        operation: Operation,
        resource: &str,
        id: &RecordId,
    ) -> Result<Option<Record>, DataError> {
        let table = self.table(resource)?;
        let id_column = self.config.id_column_for(resource);
        let (sql, values) = self
            .builder(table)
            .where_eq(id_column, id.to_value())
            .limit(1)
            .build_select_checked(&["*"])
            .map_err(|e| query_error(resource, e))?;
        debug!(provider = PROVIDER, resource, sql = %sql, "fetch row");

        let row: Option<AnyRow> = bind_values(sqlx::query(&sql), &values)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| e.into_data_error(operation, resource, Some(id)))?;
        row.map(|row| decode_row(&row).map(|r| expose_id(r, id_column)))
            .transpose()
            .map_err(|e| e.into_data_error(operation, resource, Some(id)))
    }

    async fn list(&self, params: ListParams) -> Result<ListResult, DataError> {
        let resource = params.resource.as_str();
        let table = self.table(resource)?;
        let id_column = self.config.id_column_for(resource);
        if let Some(pagination) = &params.pagination {
            pagination.validate()?;
        }

        let filtered = apply_filter(self.builder(table), &params.filter, resource, id_column)?;

        let (count_sql, count_values) = filtered
            .build_count_checked()
            .map_err(|e| query_error(resource, e))?;
        debug!(provider = PROVIDER, resource, sql = %count_sql, "count");
        let count_row: AnyRow = bind_values(sqlx::query(&count_sql), &count_values)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.into_data_error(Operation::GetList, resource, None))?;
        let count = decode_value(&count_row, 0)
            .map_err(|e| e.into_data_error(Operation::GetList, resource, None))?;
        let total = row_count(resource, &count)?;

        // Without an explicit sort, order by key so pages stay stable.
        let (sort_column, ascending) = match &params.sort {
            Some(sort) => (column_for(&sort.field, id_column), sort.order.is_asc()),
            None => (id_column, true),
        };
        let mut select = filtered.order_by(sort_column, ascending).nulls_last(true);
        if let Some(pagination) = &params.pagination {
            select = select.limit(pagination.limit()).offset(pagination.offset());
        }
        let (sql, values) = select
            .build_select_checked(&["*"])
            .map_err(|e| query_error(resource, e))?;
        debug!(provider = PROVIDER, resource, sql = %sql, "select");

        let rows: Vec<AnyRow> = bind_values(sqlx::query(&sql), &values)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.into_data_error(Operation::GetList, resource, None))?;
        let data = rows
            .iter()
            .map(|row| decode_row(row).map(|r| expose_id(r, id_column)))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.into_data_error(Operation::GetList, resource, None))?;
        Ok(ListResult::exact(data, total))
    }

    async fn insert(&self, params: CreateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let table = self.table(resource)?;
        let id_column = self.config.id_column_for(resource);
        let data = hide_id(params.data.clone(), id_column);
        let supplied_id = data.get(id_column).and_then(RecordId::from_value);

        let columns: Vec<(&str, &Value)> = data.iter().map(|(k, v)| (k.as_str(), v)).collect();
        let returning = self.dialect.supports_returning();
        let (sql, values) = self
            .builder(table)
            .build_insert(&columns, returning)
            .map_err(|e| query_error(resource, e))?;
        debug!(provider = PROVIDER, resource, sql = %sql, "insert");

        let query = bind_values(sqlx::query(&sql), &values);
        if returning {
            let row: AnyRow = query
                .fetch_one(&self.pool)
                .await
                .map_err(|e| e.into_data_error(Operation::Create, resource, None))?;
            let record = decode_row(&row)
                .map_err(|e| e.into_data_error(Operation::Create, resource, None))?;
            return Ok(RecordResult::new(expose_id(record, id_column)));
        }

        let done = query
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error(Operation::Create, resource, None))?;
        let id = supplied_id
            .or_else(|| done.last_insert_id().map(RecordId::Int))
            .ok_or_else(|| {
                DataError::from(BackendError::new(
                    PROVIDER,
                    Operation::Create,
                    resource,
                    "backend did not report the id of the inserted row",
                ))
            })?;
        let record = self
            .fetch_row(Operation::Create, resource, &id)
            .await?
            .ok_or_else(|| DataError::not_found(resource, id.clone()))?;
        Ok(RecordResult::new(record))
    }

    async fn modify(&self, params: UpdateParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let table = self.table(resource)?;
        let id_column = self.config.id_column_for(resource);
        let mut data = hide_id(params.data.clone(), id_column);
        // The key itself is never rewritten.
        data.remove(id_column);

        if !data.is_empty() {
            let columns: Vec<(&str, &Value)> = data.iter().map(|(k, v)| (k.as_str(), v)).collect();
            let (sql, values) = self
                .builder(table)
                .build_update(&columns, id_column, &params.id.to_value())
                .map_err(|e| query_error(resource, e))?;
            debug!(provider = PROVIDER, resource, id = %params.id, sql = %sql, "update");
            bind_values(sqlx::query(&sql), &values)
                .execute(&self.pool)
                .await
                .map_err(|e| e.into_data_error(Operation::Update, resource, Some(&params.id)))?;
        }

        let record = self
            .fetch_row(Operation::Update, resource, &params.id)
            .await?
            .ok_or_else(|| DataError::not_found(resource, params.id.clone()))?;
        Ok(RecordResult::new(record))
    }

    async fn remove(&self, params: DeleteParams) -> Result<RecordResult, DataError> {
        let resource = params.resource.as_str();
        let table = self.table(resource)?;
        let id_column = self.config.id_column_for(resource);
        let prior = self
            .fetch_row(Operation::Delete, resource, &params.id)
            .await?
            .ok_or_else(|| DataError::not_found(resource, params.id.clone()))?;

        let (sql, values) = self
            .builder(table)
            .build_delete(id_column, &params.id.to_value())
            .map_err(|e| query_error(resource, e))?;
        debug!(provider = PROVIDER, resource, id = %params.id, sql = %sql, "delete");
        let done = bind_values(sqlx::query(&sql), &values)
            .execute(&self.pool)
            .await
            .map_err(|e| e.into_data_error(Operation::Delete, resource, Some(&params.id)))?;
        if done.rows_affected() == 0 {
            return Err(DataError::not_found(resource, params.id));
        }
        Ok(RecordResult::new(prior))
    }
}

/// Read a `COUNT(*)` cell. Some drivers hand it back as text.
fn row_count(resource: &str, value: &Value) -> Result<u64, DataError> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| {
            BackendError::new(
                PROVIDER,
                Operation::GetList,
                resource,
                format!("COUNT(*) returned {value}, expected a non-negative integer"),
            )
            .into()
        })
}

fn column_for<'a>(field: &'a str, id_column: &'a str) -> &'a str {
    if field == "id" {
        id_column
    } else {
        field
    }
}

/// Translate every filter condition into a WHERE clause.
fn apply_filter(
    mut builder: QueryBuilder,
    filter: &Filter,
    resource: &str,
    id_column: &str,
) -> Result<QueryBuilder, DataError> {
    for cond in filter.conditions() {
        let column = column_for(cond.field, id_column);
        let value = cond.value.clone();
        builder = match cond.operator {
            FilterOperator::Eq if value.is_null() => builder.where_null(column),
            FilterOperator::Eq => builder.where_eq(column, value),
            FilterOperator::Ne if value.is_null() => builder.where_not_null(column),
            FilterOperator::Ne => builder.where_not_eq(column, value),
            FilterOperator::Lt => builder.where_lt(column, value),
            FilterOperator::Lte => builder.where_lte(column, value),
            FilterOperator::Gt => builder.where_gt(column, value),
            FilterOperator::Gte => builder.where_gte(column, value),
            FilterOperator::Contains => builder.where_contains(column, &cond.text(PROVIDER, resource)?),
            FilterOperator::StartsWith => {
                builder.where_starts_with(column, &cond.text(PROVIDER, resource)?)
            }
            FilterOperator::EndsWith => builder.where_ends_with(column, &cond.text(PROVIDER, resource)?),
            FilterOperator::In => builder.where_in(column, cond.list(PROVIDER, resource)?.to_vec()),
            FilterOperator::NotIn => builder.where_not_in(column, cond.list(PROVIDER, resource)?.to_vec()),
            FilterOperator::Null => builder.where_null(column),
            FilterOperator::NotNull => builder.where_not_null(column),
            FilterOperator::Between => {
                let (low, high) = cond.range(PROVIDER, resource)?;
                builder.where_between(column, low.clone(), high.clone())
            }
            FilterOperator::Other(_) => return Err(cond.unsupported(PROVIDER, resource)),
        };
    }
    Ok(builder)
}

impl CrudProvider for SqlProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    fn get_list(&self, params: ListParams) -> ProviderFuture<'_, ListResult> {
        Box::pin(self.list(params))
    }

    fn get_one(&self, params: GetOneParams) -> ProviderFuture<'_, RecordResult> {
        Box::pin(async move {
            let record = self
                .fetch_row(Operation::GetOne, &params.resource, &params.id)
                .await?
                .ok_or_else(|| DataError::not_found(params.resource.clone(), params.id.clone()))?;
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn where_clause(filter: Filter) -> Result<(String, Vec<Value>), DataError> {
        let builder = QueryBuilder::new_with_dialect("t", Dialect::Sqlite);
        let builder = apply_filter(builder, &filter, "t", "id")?;
        builder.build_select_checked(&["*"]).map_err(|e| query_error("t", e))
    }

    #[test]
    fn count_must_be_a_non_negative_integer() {
        assert_eq!(row_count("t", &json!(12)).unwrap(), 12);
        assert_eq!(row_count("t", &json!("7")).unwrap(), 7);
        for bad in [json!(null), json!(-1), json!("many"), json!(1.5)] {
            let err = row_count("t", &bad).unwrap_err();
            assert!(matches!(err, DataError::Backend(_)), "{bad} gave {err:?}");
        }
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let (sql, values) = where_clause(Filter::new().eq("deleted_at", Value::Null)).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE deleted_at IS NULL");
        assert!(values.is_empty());

        let (sql, _) = where_clause(Filter::new().op("email", FilterOperator::Ne, Value::Null)).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE email IS NOT NULL");
    }

    #[test]
    fn operators_map_to_sql() {
        let filter = Filter::new()
            .op("age", FilterOperator::Between, json!([18, 30]))
            .op("name", FilterOperator::StartsWith, "A")
            .op("role", FilterOperator::In, json!(["admin", "ops"]));
        let (sql, values) = where_clause(filter).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE age BETWEEN ? AND ? AND name LIKE ? ESCAPE '\\' AND role IN (?, ?)"
        );
        assert_eq!(values, vec![json!(18), json!(30), json!("A%"), json!("admin"), json!("ops")]);
    }

    #[test]
    fn unknown_operator_is_a_translation_error() {
        let err = where_clause(Filter::new().op("name", FilterOperator::Other("regex".into()), "^a"))
            .unwrap_err();
        assert!(matches!(err, DataError::Translation { provider: "sql", .. }));
    }

    #[test]
    fn id_field_targets_the_key_column() {
        let builder = QueryBuilder::new_with_dialect("t", Dialect::Sqlite);
        let builder = apply_filter(builder, &Filter::new().eq("id", 3), "t", "pk").unwrap();
        let (sql, _) = builder.build_select_checked(&["*"]).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE pk = ?");
    }
}
