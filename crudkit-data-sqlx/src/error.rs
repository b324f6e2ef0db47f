use crudkit_data::{BackendError, DataError, Operation, QueryError, RecordId};
use sqlx::error::ErrorKind;

use crate::provider::PROVIDER;

/// Extension trait for converting `sqlx::Error` into `DataError`.
///
/// Due to Rust's orphan rules, we can't implement `From<sqlx::Error> for DataError`
/// in this crate, so the conversion takes the call context explicitly.
pub trait SqlxErrorExt {
    fn into_data_error(self, operation: Operation, resource: &str, id: Option<&RecordId>) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn into_data_error(self, operation: Operation, resource: &str, id: Option<&RecordId>) -> DataError {
        if let (sqlx::Error::RowNotFound, Some(id)) = (&self, id) {
            return DataError::not_found(resource, id.clone());
        }
        // Constraint violations get the HTTP status an API would answer with;
        // transport failures keep no status so callers may retry them.
        let status = match &self {
            sqlx::Error::Database(db) => Some(match db.kind() {
                ErrorKind::UniqueViolation => 409,
                ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => 422,
                _ => 400,
            }),
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. } => Some(422),
            sqlx::Error::Configuration(_) => Some(400),
            _ => None,
        };
        let message = match &self {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => format!("{} (code {code})", db.message()),
                None => db.message().to_string(),
            },
            other => other.to_string(),
        };
        let mut err = BackendError::new(PROVIDER, operation, resource, message)
            .with_id(id.cloned())
            .with_source(self);
        if let Some(status) = status {
            err = err.with_status(status);
        }
        DataError::Backend(err)
    }
}

/// A rejected identifier in a filter or sort is a translation problem.
pub(crate) fn query_error(resource: &str, err: QueryError) -> DataError {
    DataError::translation(PROVIDER, resource, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_with_id_is_not_found() {
        let id = RecordId::Int(7);
        let err = sqlx::Error::RowNotFound.into_data_error(Operation::GetOne, "items", Some(&id));
        assert!(err.is_not_found());
    }

    #[test]
    fn transport_errors_are_retryable() {
        let err = sqlx::Error::PoolTimedOut.into_data_error(Operation::GetList, "items", None);
        match &err {
            DataError::Backend(b) => {
                assert_eq!(b.provider, "sql");
                assert_eq!(b.status, None);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn decode_errors_are_not_retryable() {
        let err = sqlx::Error::ColumnNotFound("qty".into()).into_data_error(Operation::GetList, "items", None);
        assert!(!err.is_retryable());
    }
}
