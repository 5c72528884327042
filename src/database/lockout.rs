use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::lockout::{LockedUser, LockoutPolicy, LockoutPolicyRequest, LockoutState};
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait LockoutRepository {
    /// First stored policy row, if any.
    async fn get_lockout_policy(&self) -> Result<Option<LockoutPolicy>, AppError>;
    async fn save_lockout_state(&self, state: &LockoutState) -> Result<(), AppError>;
}

#[async_trait::async_trait]
impl LockoutRepository for PostgresRepository {
    async fn get_lockout_policy(&self) -> Result<Option<LockoutPolicy>, AppError> {
        let policy = sqlx::query_as::<_, LockoutPolicy>(
            r#"
            SELECT id, max_failed_access_attempts, lockout_duration_minutes, updated_at
            FROM lockout_policies
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(policy)
    }

    async fn save_lockout_state(&self, state: &LockoutState) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_access_count = $1, lockout_end = $2, is_locked = $3
            WHERE id = $4
            "#,
        )
        .bind(state.failed_access_count)
        .bind(state.lockout_end)
        .bind(state.is_locked)
        .bind(state.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::UserNotFound);
        }

        Ok(())
    }
}

impl PostgresRepository {
    /// Overwrites the first policy row, creating it when the table is empty.
    pub async fn upsert_lockout_policy(&self, request: &LockoutPolicyRequest) -> Result<LockoutPolicy, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, LockoutPolicy>(
            r#"
            UPDATE lockout_policies
            SET max_failed_access_attempts = $1, lockout_duration_minutes = $2, updated_at = now()
            WHERE id = (SELECT id FROM lockout_policies ORDER BY id LIMIT 1)
            RETURNING id, max_failed_access_attempts, lockout_duration_minutes, updated_at
            "#,
        )
        .bind(request.max_failed_access_attempts)
        .bind(request.lockout_duration_minutes)
        .fetch_optional(&mut *tx)
        .await?;

        let policy = match updated {
            Some(policy) => policy,
            None => {
                sqlx::query_as::<_, LockoutPolicy>(
                    r#"
                    INSERT INTO lockout_policies (max_failed_access_attempts, lockout_duration_minutes)
                    VALUES ($1, $2)
                    RETURNING id, max_failed_access_attempts, lockout_duration_minutes, updated_at
                    "#,
                )
                .bind(request.max_failed_access_attempts)
                .bind(request.lockout_duration_minutes)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(policy)
    }

    pub async fn get_lockout_state(&self, user_id: &Uuid) -> Result<Option<LockoutState>, AppError> {
        let state = sqlx::query_as::<_, LockoutState>(
            r#"
            SELECT id AS user_id, failed_access_count, lockout_end, is_locked
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    /// Users whose lockout has not yet elapsed at `now`.
    pub async fn list_locked_users(&self, now: DateTime<Utc>) -> Result<Vec<LockedUser>, AppError> {
        let users = sqlx::query_as::<_, LockedUser>(
            r#"
            SELECT id, name, email, lockout_end
            FROM users
            WHERE lockout_end IS NOT NULL AND lockout_end > $1
            ORDER BY lockout_end DESC
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
