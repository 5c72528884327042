use crate::error::app_error::AppError;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PostgresRepository {
    pub pool: PgPool,
}

/// Turn a unique-constraint violation into a 409, everything else into a database error.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    if let sqlx::Error::Database(db_error) = &e
        && db_error.is_unique_violation()
    {
        return AppError::Conflict(message.to_string());
    }
    AppError::from(e)
}
