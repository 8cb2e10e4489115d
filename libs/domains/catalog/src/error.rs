use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A write violated a storage constraint (unique name, foreign key)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("File storage error: {0}")]
    Storage(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Operation cancelled")]
    Cancelled,
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Fail with [`CatalogError::Cancelled`] once the caller has gone away.
pub fn ensure_active(cancel: &CancellationToken) -> CatalogResult<()> {
    if cancel.is_cancelled() {
        return Err(CatalogError::Cancelled);
    }
    Ok(())
}

impl From<DbErr> for CatalogError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(msg))
            | Some(SqlErr::ForeignKeyConstraintViolation(msg)) => CatalogError::Conflict(msg),
            _ => CatalogError::Database(err.to_string()),
        }
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::Storage(err.to_string())
    }
}

/// Convert CatalogError to AppError for standardized error responses
impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Conflict(msg) => AppError::Conflict(msg),
            CatalogError::Database(msg) => AppError::Database(msg),
            CatalogError::Storage(msg) => AppError::FileStorage(msg),
            CatalogError::InvalidImage(msg) => AppError::BadRequest(msg),
            CatalogError::Cancelled => AppError::Cancelled("client disconnected".to_string()),
        }
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_conflict_renders_409() {
        let response = CatalogError::Conflict("duplicate key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_cancelled_renders_503() {
        let response = CatalogError::Cancelled.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_ensure_active() {
        let cancel = CancellationToken::new();
        assert!(ensure_active(&cancel).is_ok());

        cancel.cancel();
        assert!(matches!(ensure_active(&cancel), Err(CatalogError::Cancelled)));
    }

    #[test]
    fn test_db_error_without_sql_cause_is_database() {
        let err: CatalogError = DbErr::Custom("pool timed out".to_string()).into();
        assert!(matches!(err, CatalogError::Database(_)));
    }
}
