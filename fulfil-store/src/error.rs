use fulfil_order::StoreError;

/// SQLSTATE for a column referenced by a statement that the table lacks.
pub const UNDEFINED_COLUMN: &str = "42703";
pub const UNDEFINED_TABLE: &str = "42P01";

pub(crate) fn db_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) => match db.code().as_deref() {
            Some(UNDEFINED_COLUMN) | Some(UNDEFINED_TABLE) => StoreError::SchemaDrift(db.message().to_string()),
            _ => StoreError::Unavailable(db.message().to_string()),
        },
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) | sqlx::Error::Decode(_) => {
            StoreError::Corrupt(e.to_string())
        }
        _ => StoreError::Unavailable(e.to_string()),
    }
}

pub(crate) fn is_undefined_column(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_COLUMN))
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_are_unavailable() {
        assert!(matches!(db_error(sqlx::Error::PoolTimedOut), StoreError::Unavailable(_)));
        assert!(matches!(
            db_error(sqlx::Error::ColumnNotFound("version".to_string())),
            StoreError::Corrupt(_)
        ));
        assert!(!is_undefined_column(&sqlx::Error::RowNotFound));
    }
}
