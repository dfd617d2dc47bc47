use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the JSON API. Pages translate failures into flash codes instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("model error: {0}")]
    Model(String),
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Database(_) | AppError::Model(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AppError::Database(e) = self {
            tracing::error!(error = %e, "Database error");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "message": self.to_string()
        }))
    }
}

/// True for MySQL integrity violations (duplicate keys, failed foreign keys).
pub fn is_constraint_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

/// True when the error says a table is missing, which pages treat as "no rows yet".
pub fn is_missing_table(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("42S02"))
}

/// Database error carrying a chosen SQLSTATE.
#[cfg(test)]
pub(crate) mod test_errors {
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    pub struct SqlStateError {
        code: &'static str,
        message: &'static str,
    }

    impl DatabaseError for SqlStateError {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            match self.code {
                "23000" => ErrorKind::UniqueViolation,
                _ => ErrorKind::Other,
            }
        }
    }

    pub fn sql_state(code: &'static str, message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(SqlStateError { code, message }))
    }

    pub fn duplicate_key() -> sqlx::Error {
        sql_state("23000", "Duplicate entry 'EMP-001' for key 'employee_code'")
    }
}

#[cfg(test)]
mod tests {
    use super::test_errors::{duplicate_key, sql_state};
    use super::*;

    #[test]
    fn status_codes_follow_variant() {
        assert_eq!(
            AppError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("Employee").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_are_human_readable() {
        assert_eq!(AppError::NotFound("Employee").to_string(), "Employee not found");
        assert_eq!(AppError::Validation("salary must be >= 0".into()).to_string(), "salary must be >= 0");
    }

    #[test]
    fn sql_states_are_classified() {
        assert!(is_constraint_violation(&duplicate_key()));
        assert!(!is_missing_table(&duplicate_key()));

        let missing = sql_state("42S02", "Table 'hr.allowance_matrix' doesn't exist");
        assert!(is_missing_table(&missing));
        assert!(!is_constraint_violation(&missing));
    }

    #[test]
    fn non_database_errors_are_not_constraint_violations() {
        assert!(!is_constraint_violation(&sqlx::Error::RowNotFound));
        assert!(!is_missing_table(&sqlx::Error::PoolTimedOut));
    }
}
