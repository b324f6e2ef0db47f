//! A fluent SQL builder producing parameterized statements.
//!
//! Bind values are kept as JSON values so the backend crate decides how to
//! bind each one. Identifiers are validated (and optionally quoted) because
//! filter and sort fields arrive from callers.
//!
//! # Example
//!
//! ```
//! use crudkit_data::query::{Dialect, QueryBuilder};
//!
//! let (sql, params) = QueryBuilder::new("users")
//!     .dialect(Dialect::Postgres)
//!     .where_eq("status", "active")
//!     .where_contains("name", "ali")
//!     .order_by("id", true)
//!     .limit(10)
//!     .build_select_checked(&["*"])
//!     .unwrap();
//! assert_eq!(
//!     sql,
//!     "SELECT * FROM users WHERE status = $1 AND name LIKE $2 ESCAPE '\\' ORDER BY id ASC LIMIT 10"
//! );
//! assert_eq!(params.len(), 2);
//! ```

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Generic SQL using `?` placeholders (default).
    Generic,
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders with backtick quoting.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    /// Guess the dialect from a connection URL scheme.
    pub fn from_url(url: &str) -> Self {
        let scheme = url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Dialect::Postgres,
            "mysql" | "mariadb" => Dialect::MySql,
            "sqlite" => Dialect::Sqlite,
            _ => Dialect::Generic,
        }
    }

    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Generic | Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    fn like_escape_clause(self) -> &'static str {
        match self {
            // MySQL treats backslash as an escape inside string literals too.
            Dialect::MySql => " ESCAPE '\\\\'",
            Dialect::Generic | Dialect::Sqlite | Dialect::Postgres => " ESCAPE '\\'",
        }
    }

    /// Whether `INSERT ... RETURNING *` is available.
    pub fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// Validate identifiers against a conservative pattern.
    Validate,
    /// Validate and quote identifiers using the dialect quoting style.
    Quote,
}

/// Builder for one parameterized statement.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    conditions: Vec<Condition>,
    order: Vec<(String, bool)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
    nulls_last: bool,
    dialect: Dialect,
    identifier_policy: IdentifierPolicy,
}

#[derive(Debug, Clone)]
enum Condition {
    Compare(String, &'static str, Value),
    Like(String, String),
    In(String, Vec<Value>),
    NotIn(String, Vec<Value>),
    IsNull(String),
    IsNotNull(String),
    Between(String, Value, Value),
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
            nulls_last: false,
            dialect: Dialect::Generic,
            identifier_policy: IdentifierPolicy::Validate,
        }
    }

    /// Create a new builder with an explicit SQL dialect.
    pub fn new_with_dialect(table: &str, dialect: Dialect) -> Self {
        Self::new(table).dialect(dialect)
    }

    /// Set the SQL dialect (affects placeholder style and quoting).
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Configure identifier validation/quoting behavior.
    pub fn identifier_policy(mut self, policy: IdentifierPolicy) -> Self {
        self.identifier_policy = policy;
        self
    }

    fn compare(mut self, column: &str, op: &'static str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Compare(column.to_string(), op, value.into()));
        self
    }

    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "=", value)
    }

    pub fn where_not_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "!=", value)
    }

    pub fn where_lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<", value)
    }

    pub fn where_lte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, "<=", value)
    }

    pub fn where_gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">", value)
    }

    pub fn where_gte(self, column: &str, value: impl Into<Value>) -> Self {
        self.compare(column, ">=", value)
    }

    /// Raw LIKE pattern; `%` and `_` keep their wildcard meaning.
    pub fn where_like(mut self, column: &str, pattern: &str) -> Self {
        self.conditions
            .push(Condition::Like(column.to_string(), pattern.to_string()));
        self
    }

    pub fn where_contains(self, column: &str, needle: &str) -> Self {
        let pattern = format!("%{}%", escape_like(needle));
        self.where_like(column, &pattern)
    }

    pub fn where_starts_with(self, column: &str, prefix: &str) -> Self {
        let pattern = format!("{}%", escape_like(prefix));
        self.where_like(column, &pattern)
    }

    pub fn where_ends_with(self, column: &str, suffix: &str) -> Self {
        let pattern = format!("%{}", escape_like(suffix));
        self.where_like(column, &pattern)
    }

    pub fn where_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(column.to_string(), values));
        self
    }

    pub fn where_not_in(mut self, column: &str, values: Vec<Value>) -> Self {
        self.conditions
            .push(Condition::NotIn(column.to_string(), values));
        self
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.conditions.push(Condition::IsNull(column.to_string()));
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.conditions
            .push(Condition::IsNotNull(column.to_string()));
        self
    }

    pub fn where_between(mut self, column: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Between(
            column.to_string(),
            low.into(),
            high.into(),
        ));
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    /// Place NULLs after every other value regardless of direction.
    ///
    /// Emitted as an `IS NULL` sort key, which all dialects accept.
    pub fn nulls_last(mut self, nulls_last: bool) -> Self {
        self.nulls_last = nulls_last;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    /// Build a SELECT query returning `(sql, bind_values)`.
    ///
    /// Rejects invalid identifiers and quotes them when the policy says so.
    pub fn build_select_checked(&self, columns: &[&str]) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier_checked(&self.table, false, "table")?;
        let columns = self.format_column_list_checked(columns)?;

        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        self.append_where_checked(&mut sql, &mut params, &mut placeholder_idx)?;
        self.append_order_checked(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    /// Build a COUNT query over the same conditions (ordering and paging ignored).
    pub fn build_count_checked(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier_checked(&self.table, false, "table")?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut params = Vec::new();
        let mut placeholder_idx = 1usize;
        self.append_where_checked(&mut sql, &mut params, &mut placeholder_idx)?;
        Ok((sql, params))
    }

    /// Build an INSERT for the given column/value pairs.
    pub fn build_insert(
        &self,
        values: &[(&str, &Value)],
        returning: bool,
    ) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier_checked(&self.table, false, "table")?;
        let mut sql = if values.is_empty() {
            match self.dialect {
                Dialect::MySql => format!("INSERT INTO {table} () VALUES ()"),
                _ => format!("INSERT INTO {table} DEFAULT VALUES"),
            }
        } else {
            let mut columns = Vec::with_capacity(values.len());
            let mut placeholders = Vec::with_capacity(values.len());
            for (idx, (col, _)) in values.iter().enumerate() {
                columns.push(self.format_identifier_checked(col, false, "column")?);
                placeholders.push(self.dialect.placeholder(idx + 1));
            }
            format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            )
        };
        if returning {
            sql.push_str(" RETURNING *");
        }
        let params = values.iter().map(|(_, v)| (*v).clone()).collect();
        Ok((sql, params))
    }

    /// Build an UPDATE of `values` on the row whose `id_column` equals `id`.
    pub fn build_update(
        &self,
        values: &[(&str, &Value)],
        id_column: &str,
        id: &Value,
    ) -> Result<(String, Vec<Value>), QueryError> {
        if values.is_empty() {
            return Err(QueryError::EmptyUpdate);
        }
        let table = self.format_identifier_checked(&self.table, false, "table")?;
        let mut placeholder_idx = 1usize;
        let mut assignments = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len() + 1);
        for (col, value) in values {
            let col = self.format_identifier_checked(col, false, "column")?;
            assignments.push(format!("{col} = {}", self.dialect.placeholder(placeholder_idx)));
            placeholder_idx += 1;
            params.push((*value).clone());
        }
        let id_col = self.format_identifier_checked(id_column, false, "column")?;
        let sql = format!(
            "UPDATE {table} SET {} WHERE {id_col} = {}",
            assignments.join(", "),
            self.dialect.placeholder(placeholder_idx)
        );
        params.push(id.clone());
        Ok((sql, params))
    }

    /// Build a DELETE of the row whose `id_column` equals `id`.
    pub fn build_delete(&self, id_column: &str, id: &Value) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.format_identifier_checked(&self.table, false, "table")?;
        let id_col = self.format_identifier_checked(id_column, false, "column")?;
        let sql = format!(
            "DELETE FROM {table} WHERE {id_col} = {}",
            self.dialect.placeholder(1)
        );
        Ok((sql, vec![id.clone()]))
    }

    fn append_where_checked(
        &self,
        sql: &mut String,
        params: &mut Vec<Value>,
        placeholder_idx: &mut usize,
    ) -> Result<(), QueryError> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        sql.push_str(" WHERE ");
        let mut first = true;
        for cond in &self.conditions {
            if !first {
                sql.push_str(" AND ");
            }
            first = false;
            match cond {
                Condition::Compare(col, op, val) => {
                    let col = self.format_identifier_checked(col, false, "column")?;
                    let placeholder = self.next_placeholder(placeholder_idx);
                    sql.push_str(&format!("{col} {op} {placeholder}"));
                    params.push(val.clone());
                }
                Condition::Like(col, pat) => {
                    let col = self.format_identifier_checked(col, false, "column")?;
                    let placeholder = self.next_placeholder(placeholder_idx);
                    sql.push_str(&format!(
                        "{col} LIKE {placeholder}{}",
                        self.dialect.like_escape_clause()
                    ));
                    params.push(Value::String(pat.clone()));
                }
                Condition::In(col, vals) | Condition::NotIn(col, vals) => {
                    let negated = matches!(cond, Condition::NotIn(..));
                    if vals.is_empty() {
                        // Nothing is IN an empty set; everything is NOT IN it.
                        sql.push_str(if negated { "1 = 1" } else { "1 = 0" });
                        continue;
                    }
                    let col = self.format_identifier_checked(col, false, "column")?;
                    let placeholders: Vec<_> = vals
                        .iter()
                        .map(|_| self.next_placeholder(placeholder_idx))
                        .collect();
                    let keyword = if negated { "NOT IN" } else { "IN" };
                    sql.push_str(&format!("{col} {keyword} ({})", placeholders.join(", ")));
                    params.extend(vals.iter().cloned());
                }
                Condition::IsNull(col) => {
                    let col = self.format_identifier_checked(col, false, "column")?;
                    sql.push_str(&format!("{col} IS NULL"));
                }
                Condition::IsNotNull(col) => {
                    let col = self.format_identifier_checked(col, false, "column")?;
                    sql.push_str(&format!("{col} IS NOT NULL"));
                }
                Condition::Between(col, low, high) => {
                    let col = self.format_identifier_checked(col, false, "column")?;
                    let lo = self.next_placeholder(placeholder_idx);
                    let hi = self.next_placeholder(placeholder_idx);
                    sql.push_str(&format!("{col} BETWEEN {lo} AND {hi}"));
                    params.push(low.clone());
                    params.push(high.clone());
                }
            }
        }
        Ok(())
    }

    fn next_placeholder(&self, placeholder_idx: &mut usize) -> String {
        let placeholder = self.dialect.placeholder(*placeholder_idx);
        *placeholder_idx += 1;
        placeholder
    }

    fn append_order_checked(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for (col, asc) in &self.order {
            let col = self.format_identifier_checked(col, false, "column")?;
            if self.nulls_last {
                clauses.push(format!("{col} IS NULL"));
            }
            if *asc {
                clauses.push(format!("{col} ASC"));
            } else {
                clauses.push(format!("{col} DESC"));
            }
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        // Backends reject LIMIT/OFFSET literals beyond a signed 64-bit integer.
        let clamp = |n: u64| n.min(i64::MAX as u64);
        match (self.limit_val.map(clamp), self.offset_val.map(clamp)) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            // SQLite and MySQL require a LIMIT before OFFSET.
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT {} OFFSET {offset}", i64::MAX)),
            (None, None) => {}
        }
    }

    fn format_column_list_checked(&self, columns: &[&str]) -> Result<String, QueryError> {
        let mut out = Vec::with_capacity(columns.len());
        for col in columns {
            out.push(self.format_identifier_checked(col, true, "column")?);
        }
        Ok(out.join(", "))
    }

    fn format_identifier_checked(
        &self,
        ident: &str,
        allow_star: bool,
        kind: &'static str,
    ) -> Result<String, QueryError> {
        if !is_valid_identifier(ident, allow_star) {
            return Err(QueryError::InvalidIdentifier {
                kind,
                ident: ident.to_string(),
            });
        }
        match self.identifier_policy {
            IdentifierPolicy::Quote => Ok(quote_identifier(ident, self.dialect, allow_star)),
            IdentifierPolicy::Validate => Ok(ident.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidIdentifier { kind: &'static str, ident: String },
    EmptyUpdate,
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::InvalidIdentifier { kind, ident } => {
                write!(f, "Invalid {kind} identifier: {ident}")
            }
            QueryError::EmptyUpdate => write!(f, "UPDATE without any column to set"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Escape LIKE wildcards so user text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
    }
    true
}

fn quote_identifier(ident: &str, dialect: Dialect, allow_star: bool) -> String {
    let quote = dialect.quote_char();
    let parts: Vec<&str> = ident.split('.').collect();
    let last_idx = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            if allow_star && part == "*" && idx == last_idx {
                part.to_string()
            } else {
                format!("{quote}{part}{quote}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_select() {
        let (sql, params) = QueryBuilder::new("users").build_select_checked(&["*"]).unwrap();
        assert_eq!(sql, "SELECT * FROM users");
        assert!(params.is_empty());
    }

    #[test]
    fn test_complex_query() {
        let (sql, params) = QueryBuilder::new("users")
            .where_eq("status", "active")
            .where_gte("age", 18)
            .order_by("id", true)
            .limit(10)
            .offset(20)
            .build_select_checked(&["id", "name"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT id, name FROM users WHERE status = ? AND age >= ? ORDER BY id ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![json!("active"), json!(18)]);
    }

    #[test]
    fn test_huge_paging_is_clamped() {
        let (sql, _) = QueryBuilder::new("users")
            .limit(u64::MAX)
            .offset(u64::MAX)
            .build_select_checked(&["id"])
            .unwrap();
        assert_eq!(
            sql,
            format!("SELECT id FROM users LIMIT {0} OFFSET {0}", i64::MAX)
        );
    }

    #[test]
    fn test_count_ignores_order_and_paging() {
        let (sql, params) = QueryBuilder::new("users")
            .where_eq("active", true)
            .order_by("id", false)
            .limit(5)
            .build_count_checked()
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM users WHERE active = ?");
        assert_eq!(params, vec![json!(true)]);
    }

    #[test]
    fn test_postgres_placeholders() {
        let (sql, params) = QueryBuilder::new_with_dialect("users", Dialect::Postgres)
            .where_eq("status", "active")
            .where_in("role", vec![json!("admin"), json!("user")])
            .where_between("age", 18, 65)
            .build_select_checked(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users WHERE status = $1 AND role IN ($2, $3) AND age BETWEEN $4 AND $5"
        );
        assert_eq!(params.len(), 5);
    }

    #[test]
    fn test_like_patterns_are_escaped() {
        let (sql, params) = QueryBuilder::new("items")
            .where_contains("name", "50%_off")
            .where_starts_with("code", "A")
            .where_ends_with("sku", "z")
            .build_select_checked(&["*"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM items WHERE name LIKE ? ESCAPE '\\' AND code LIKE ? ESCAPE '\\' AND sku LIKE ? ESCAPE '\\'"
        );
        assert_eq!(
            params,
            vec![json!("%50\\%\\_off%"), json!("A%"), json!("%z")]
        );
    }

    #[test]
    fn test_empty_in_lists() {
        let (sql, params) = QueryBuilder::new("t")
            .where_in("a", vec![])
            .where_not_in("b", vec![])
            .build_select_checked(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE 1 = 0 AND 1 = 1");
        assert!(params.is_empty());
    }

    #[test]
    fn test_null_checks() {
        let (sql, _) = QueryBuilder::new("t")
            .where_null("deleted_at")
            .where_not_null("email")
            .build_select_checked(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE deleted_at IS NULL AND email IS NOT NULL");
    }

    #[test]
    fn test_checked_identifiers_and_quoting() {
        let (sql, params) = QueryBuilder::new("users")
            .dialect(Dialect::Postgres)
            .identifier_policy(IdentifierPolicy::Quote)
            .where_eq("users.email", "a@b.com")
            .order_by("users.id", true)
            .build_select_checked(&["users.id", "users.email"])
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"users\".\"id\", \"users\".\"email\" FROM \"users\" WHERE \"users\".\"email\" = $1 ORDER BY \"users\".\"id\" ASC"
        );
        assert_eq!(params, vec![json!("a@b.com")]);
    }

    #[test]
    fn test_checked_invalid_identifier() {
        let err = QueryBuilder::new("users")
            .where_eq("name; DROP TABLE users", 1)
            .build_select_checked(&["*"])
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidIdentifier { kind: "column", .. }));
    }

    #[test]
    fn test_insert_update_delete() {
        let name = json!("a");
        let qty = json!(5);
        let qb = QueryBuilder::new_with_dialect("items", Dialect::Postgres)
            .identifier_policy(IdentifierPolicy::Quote);

        let (sql, params) = qb.build_insert(&[("name", &name), ("qty", &qty)], true).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"items\" (\"name\", \"qty\") VALUES ($1, $2) RETURNING *"
        );
        assert_eq!(params, vec![json!("a"), json!(5)]);

        let (sql, params) = qb.build_update(&[("qty", &qty)], "id", &json!(3)).unwrap();
        assert_eq!(sql, "UPDATE \"items\" SET \"qty\" = $1 WHERE \"id\" = $2");
        assert_eq!(params, vec![json!(5), json!(3)]);

        let (sql, params) = qb.build_delete("id", &json!(3)).unwrap();
        assert_eq!(sql, "DELETE FROM \"items\" WHERE \"id\" = $1");
        assert_eq!(params, vec![json!(3)]);
    }

    #[test]
    fn test_empty_insert_and_update() {
        let qb = QueryBuilder::new("items");
        let (sql, _) = qb.build_insert(&[], false).unwrap();
        assert_eq!(sql, "INSERT INTO items DEFAULT VALUES");
        assert_eq!(
            qb.build_update(&[], "id", &json!(1)).unwrap_err(),
            QueryError::EmptyUpdate
        );
    }

    #[test]
    fn test_nulls_last_ordering() {
        let (sql, _) = QueryBuilder::new("t")
            .order_by("due", false)
            .nulls_last(true)
            .build_select_checked(&["*"])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t ORDER BY due IS NULL, due DESC");
    }

    #[test]
    fn test_dialect_from_url() {
        assert_eq!(Dialect::from_url("postgres://localhost/db"), Dialect::Postgres);
        assert_eq!(Dialect::from_url("mysql://root@localhost/db"), Dialect::MySql);
        assert_eq!(Dialect::from_url("sqlite::memory:"), Dialect::Sqlite);
    }
}
