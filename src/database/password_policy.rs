use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::password_policy::{PasswordPolicy, PasswordPolicyRequest};
use uuid::Uuid;

#[async_trait::async_trait]
pub trait PasswordPolicyRepository {
    async fn get_password_policy(&self) -> Result<Option<PasswordPolicy>, AppError>;
    /// Newest first.
    async fn recent_password_hashes(&self, user_id: &Uuid, limit: i64) -> Result<Vec<String>, AppError>;
    async fn insert_password_history(&self, user_id: &Uuid, password_hash: &str) -> Result<(), AppError>;
    /// Deletes everything but the `keep` newest rows for the user, returning the number removed.
    async fn prune_password_history(&self, user_id: &Uuid, keep: i64) -> Result<u64, AppError>;
}

#[async_trait::async_trait]
impl PasswordPolicyRepository for PostgresRepository {
    async fn get_password_policy(&self) -> Result<Option<PasswordPolicy>, AppError> {
        let policy = sqlx::query_as::<_, PasswordPolicy>(
            r#"
            SELECT min_length, require_complexity, password_history_count,
                   min_password_age_days, max_password_age_days, updated_at
            FROM password_policies
            ORDER BY id
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(policy)
    }

    async fn recent_password_hashes(&self, user_id: &Uuid, limit: i64) -> Result<Vec<String>, AppError> {
        let hashes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT password_hash
            FROM password_history
            WHERE user_id = $1
            ORDER BY changed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(hashes)
    }

    async fn insert_password_history(&self, user_id: &Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO password_history (user_id, password_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn prune_password_history(&self, user_id: &Uuid, keep: i64) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM password_history
            WHERE user_id = $1
              AND id NOT IN (
                  SELECT id
                  FROM password_history
                  WHERE user_id = $1
                  ORDER BY changed_at DESC, id DESC
                  LIMIT $2
              )
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

impl PostgresRepository {
    /// Overwrites the first policy row, creating it when the table is empty.
    pub async fn upsert_password_policy(&self, request: &PasswordPolicyRequest) -> Result<PasswordPolicy, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, PasswordPolicy>(
            r#"
            UPDATE password_policies
            SET min_length = $1,
                require_complexity = $2,
                password_history_count = $3,
                min_password_age_days = $4,
                max_password_age_days = $5,
                updated_at = now()
            WHERE id = (SELECT id FROM password_policies ORDER BY id LIMIT 1)
            RETURNING min_length, require_complexity, password_history_count,
                      min_password_age_days, max_password_age_days, updated_at
            "#,
        )
        .bind(request.min_length)
        .bind(request.require_complexity)
        .bind(request.password_history_count)
        .bind(request.min_password_age_days)
        .bind(request.max_password_age_days)
        .fetch_optional(&mut *tx)
        .await?;

        let policy = match updated {
            Some(policy) => policy,
            None => {
                sqlx::query_as::<_, PasswordPolicy>(
                    r#"
                    INSERT INTO password_policies
                        (min_length, require_complexity, password_history_count, min_password_age_days, max_password_age_days)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING min_length, require_complexity, password_history_count,
                              min_password_age_days, max_password_age_days, updated_at
                    "#,
                )
                .bind(request.min_length)
                .bind(request.require_complexity)
                .bind(request.password_history_count)
                .bind(request.min_password_age_days)
                .bind(request.max_password_age_days)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        Ok(policy)
    }
}
