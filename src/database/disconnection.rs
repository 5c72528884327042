use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::consumer::ConsumerStatus;
use crate::models::disconnection::{Disconnection, DisconnectionRequest};
use crate::models::pagination::PaginationParams;
use uuid::Uuid;

const DISCONNECTION_COLUMNS: &str = "id, consumer_id, reason, scheduled_for, disconnected_at, reconnected_at, created_by, created_at";

impl PostgresRepository {
    pub async fn create_disconnection(&self, request: &DisconnectionRequest, created_by: &Uuid) -> Result<Disconnection, AppError> {
        let disconnection = sqlx::query_as::<_, Disconnection>(&format!(
            r#"
            INSERT INTO disconnections (consumer_id, reason, scheduled_for, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING {DISCONNECTION_COLUMNS}
            "#
        ))
        .bind(request.consumer_id)
        .bind(&request.reason)
        .bind(request.scheduled_for)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(disconnection)
    }

    pub async fn get_disconnection_by_id(&self, id: &Uuid) -> Result<Option<Disconnection>, AppError> {
        let disconnection = sqlx::query_as::<_, Disconnection>(&format!("SELECT {DISCONNECTION_COLUMNS} FROM disconnections WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(disconnection)
    }

    pub async fn list_disconnections(&self, consumer_id: Option<&Uuid>, params: &PaginationParams) -> Result<(Vec<Disconnection>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM disconnections WHERE ($1::uuid IS NULL OR consumer_id = $1)")
            .bind(consumer_id)
            .fetch_one(&self.pool)
            .await?;

        let disconnections = sqlx::query_as::<_, Disconnection>(&format!(
            r#"
            SELECT {DISCONNECTION_COLUMNS}
            FROM disconnections
            WHERE ($1::uuid IS NULL OR consumer_id = $1)
            ORDER BY scheduled_for DESC, created_at DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(consumer_id)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((disconnections, total))
    }

    /// Stamps the disconnection and flips the consumer to disconnected in one transaction.
    pub async fn mark_disconnected(&self, disconnection: &Disconnection) -> Result<Disconnection, AppError> {
        self.set_disconnection_state(disconnection, "disconnected_at", ConsumerStatus::Disconnected).await
    }

    pub async fn mark_reconnected(&self, disconnection: &Disconnection) -> Result<Disconnection, AppError> {
        self.set_disconnection_state(disconnection, "reconnected_at", ConsumerStatus::Active).await
    }

    async fn set_disconnection_state(&self, disconnection: &Disconnection, column: &str, status: ConsumerStatus) -> Result<Disconnection, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Disconnection>(&format!(
            r#"
            UPDATE disconnections
            SET {column} = now()
            WHERE id = $1 AND {column} IS NULL
            RETURNING {DISCONNECTION_COLUMNS}
            "#
        ))
        .bind(disconnection.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("disconnection was updated concurrently".to_string()))?;

        sqlx::query("UPDATE consumers SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status)
            .bind(disconnection.consumer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(updated)
    }
}
