use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::privacy::PrivacyPolicy;
use chrono::{DateTime, Utc};
use uuid::Uuid;

impl PostgresRepository {
    /// Highest version whose publication date has been reached.
    pub async fn get_published_privacy_policy(&self) -> Result<Option<PrivacyPolicy>, AppError> {
        let policy = sqlx::query_as::<_, PrivacyPolicy>(
            r#"
            SELECT id, version, title, content, published_at
            FROM privacy_policies
            WHERE published_at <= now()
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(policy)
    }
}

#[async_trait::async_trait]
pub trait PrivacyRepository {
    /// Highest version whose publication date has been reached.
    async fn get_published_privacy_version(&self) -> Result<Option<i32>, AppError>;
    async fn get_privacy_agreement(&self, user_id: &Uuid) -> Result<(Option<i32>, Option<DateTime<Utc>>), AppError>;
    /// Returns the agreement timestamp.
    async fn record_privacy_consent(&self, user_id: &Uuid, version: i32) -> Result<DateTime<Utc>, AppError>;
}

#[async_trait::async_trait]
impl PrivacyRepository for PostgresRepository {
    async fn get_published_privacy_version(&self) -> Result<Option<i32>, AppError> {
        let version = sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(version) FROM privacy_policies WHERE published_at <= now()")
            .fetch_one(&self.pool)
            .await?;

        Ok(version)
    }

    async fn get_privacy_agreement(&self, user_id: &Uuid) -> Result<(Option<i32>, Option<DateTime<Utc>>), AppError> {
        let agreement = sqlx::query_as::<_, (Option<i32>, Option<DateTime<Utc>>)>("SELECT privacy_agreed_version, privacy_agreed_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        agreement.ok_or(AppError::UserNotFound)
    }

    async fn record_privacy_consent(&self, user_id: &Uuid, version: i32) -> Result<DateTime<Utc>, AppError> {
        let agreed_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            UPDATE users
            SET privacy_agreed_version = $1, privacy_agreed_at = now()
            WHERE id = $2
            RETURNING privacy_agreed_at
            "#,
        )
        .bind(version)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        agreed_at.ok_or(AppError::UserNotFound)
    }
}
