use crate::database::postgres_repository::{PostgresRepository, conflict_on_unique};
use crate::error::app_error::AppError;
use crate::models::consumer::{Consumer, ConsumerRequest};
use crate::models::pagination::PaginationParams;
use uuid::Uuid;

const CONSUMER_COLUMNS: &str = r#"
    id, account_number, name, address, meter_number, contact_email, contact_phone,
    user_id, status, created_at, updated_at
"#;

impl PostgresRepository {
    pub async fn create_consumer(&self, request: &ConsumerRequest) -> Result<Consumer, AppError> {
        let query = format!(
            r#"
            INSERT INTO consumers (account_number, name, address, meter_number, contact_email, contact_phone, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {CONSUMER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Consumer>(&query)
            .bind(&request.account_number)
            .bind(&request.name)
            .bind(&request.address)
            .bind(&request.meter_number)
            .bind(&request.contact_email)
            .bind(&request.contact_phone)
            .bind(request.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "account number or meter number already in use"))
    }

    pub async fn get_consumer_by_id(&self, id: &Uuid) -> Result<Option<Consumer>, AppError> {
        let query = format!("SELECT {CONSUMER_COLUMNS} FROM consumers WHERE id = $1");
        let consumer = sqlx::query_as::<_, Consumer>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(consumer)
    }

    pub async fn get_consumer_by_user_id(&self, user_id: &Uuid) -> Result<Option<Consumer>, AppError> {
        let query = format!("SELECT {CONSUMER_COLUMNS} FROM consumers WHERE user_id = $1");
        let consumer = sqlx::query_as::<_, Consumer>(&query).bind(user_id).fetch_optional(&self.pool).await?;

        Ok(consumer)
    }

    /// `search` matches account number, meter number or name, case-insensitively.
    pub async fn list_consumers(&self, params: &PaginationParams, search: Option<&str>) -> Result<(Vec<Consumer>, i64), AppError> {
        let pattern = search.map(|s| format!("%{}%", s.trim()));
        let filter = "($1::text IS NULL OR account_number ILIKE $1 OR meter_number ILIKE $1 OR name ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM consumers WHERE {filter}"))
            .bind(pattern.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            r#"
            SELECT {CONSUMER_COLUMNS}
            FROM consumers
            WHERE {filter}
            ORDER BY account_number
            LIMIT $2 OFFSET $3
            "#
        );
        let consumers = sqlx::query_as::<_, Consumer>(&query)
            .bind(pattern.as_deref())
            .bind(params.limit)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((consumers, total))
    }

    pub async fn update_consumer(&self, id: &Uuid, request: &ConsumerRequest) -> Result<Consumer, AppError> {
        let query = format!(
            r#"
            UPDATE consumers
            SET account_number = $1, name = $2, address = $3, meter_number = $4,
                contact_email = $5, contact_phone = $6, user_id = $7, updated_at = now()
            WHERE id = $8
            RETURNING {CONSUMER_COLUMNS}
            "#
        );

        let consumer = sqlx::query_as::<_, Consumer>(&query)
            .bind(&request.account_number)
            .bind(&request.name)
            .bind(&request.address)
            .bind(&request.meter_number)
            .bind(&request.contact_email)
            .bind(&request.contact_phone)
            .bind(request.user_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "account number or meter number already in use"))?;

        consumer.ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))
    }
}
