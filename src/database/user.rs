use crate::database::postgres_repository::{PostgresRepository, conflict_on_unique};
use crate::error::app_error::AppError;
use crate::models::pagination::PaginationParams;
use crate::models::user::{User, UserRole};
use argon2::Argon2;
use password_hash::rand_core::OsRng;
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use std::sync::LazyLock;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id, name, email, password_hash, role, failed_access_count, lockout_end, is_locked,
    password_changed_at, privacy_agreed_version, privacy_agreed_at, created_at
"#;

/// A real Argon2 hash generated once at startup, used as a timing decoy
/// so that login requests for unknown emails take as long as real ones.
static DUMMY_HASH: LazyLock<String> = LazyLock::new(|| {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(b"dummy-never-matches", &salt)
        .expect("failed to generate dummy hash")
        .to_string()
});

#[async_trait::async_trait]
pub trait UserLookupRepository {
    /// Case-insensitive on the email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
}

#[async_trait::async_trait]
impl UserLookupRepository for PostgresRepository {
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&query).bind(email).fetch_optional(&self.pool).await?;

        Ok(user)
    }
}

/// Checks `password` against a stored PHC string. A mismatch is `InvalidCredentials`.
fn verify_password_hash(stored_hash: &str, password: &str) -> Result<(), AppError> {
    let password_hash = PasswordHash::new(stored_hash).map_err(|e| AppError::password_hash("Failed to parse stored password hash", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &password_hash)
        .map_err(|_| AppError::InvalidCredentials)
}

/// Runs the Argon2 check on the blocking pool.
pub async fn verify_user_password(user: &User, password: &str) -> Result<(), AppError> {
    let stored_hash = user.password_hash.clone();
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || verify_password_hash(&stored_hash, &password)).await?
}

/// Throwaway Argon2 verification so that unknown and known accounts
/// cannot be told apart by response latency.
pub async fn dummy_verify(password: &str) {
    let password = password.to_owned();
    let outcome = tokio::task::spawn_blocking(move || verify_password_hash(&DUMMY_HASH, &password)).await;
    if let Err(e) = outcome {
        tracing::warn!(error = %e, "dummy password verification did not complete");
    }
}

impl PostgresRepository {
    /// Inserts a user whose password has already been validated and hashed.
    pub async fn create_user(&self, name: &str, email: &str, password_hash: &str, role: UserRole) -> Result<User, AppError> {
        let query = format!(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&query)
            .bind(name)
            .bind(email)
            .bind(password_hash)
            .bind(role)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match conflict_on_unique(e, "email already registered") {
                AppError::Conflict(_) => AppError::UserAlreadyExists(email.to_string()),
                other => other,
            })
    }

    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>, AppError> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(user)
    }

    pub async fn list_users(&self, params: &PaginationParams) -> Result<(Vec<User>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users").fetch_one(&self.pool).await?;

        let query = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT $1 OFFSET $2");
        let users = sqlx::query_as::<_, User>(&query)
            .bind(params.limit)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((users, total))
    }

    /// Stores a new password hash and restarts the password age clock.
    pub async fn update_password_hash(&self, user_id: &Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $1, password_changed_at = now()
            WHERE id = $2
            "#,
        )
        .bind(password_hash)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }

        Ok(())
    }
}

pub(crate) fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;

    Ok(hash.to_string())
}
