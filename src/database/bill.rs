use crate::database::postgres_repository::{PostgresRepository, conflict_on_unique};
use crate::error::app_error::AppError;
use crate::models::bill::{Bill, BillStatus, NewBill};
use crate::models::pagination::PaginationParams;
use chrono::NaiveDate;
use uuid::Uuid;

pub(crate) const BILL_COLUMNS: &str = r#"
    id, consumer_id, bill_number, period_start, period_end, previous_reading, current_reading,
    consumption_m3, amount_due, amount_paid, due_date, status, created_at
"#;

impl PostgresRepository {
    pub async fn create_bill(&self, bill: &NewBill) -> Result<Bill, AppError> {
        let query = format!(
            r#"
            INSERT INTO bills (consumer_id, bill_number, period_start, period_end, previous_reading,
                               current_reading, consumption_m3, amount_due, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BILL_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Bill>(&query)
            .bind(bill.consumer_id)
            .bind(&bill.bill_number)
            .bind(bill.period_start)
            .bind(bill.period_end)
            .bind(bill.previous_reading)
            .bind(bill.current_reading)
            .bind(bill.consumption_m3)
            .bind(bill.amount_due)
            .bind(bill.due_date)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, &format!("bill {} already issued", bill.bill_number)))
    }

    pub async fn get_bill_by_id(&self, id: &Uuid) -> Result<Option<Bill>, AppError> {
        let query = format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1");
        let bill = sqlx::query_as::<_, Bill>(&query).bind(id).fetch_optional(&self.pool).await?;

        Ok(bill)
    }

    pub async fn list_bills(
        &self,
        status: Option<BillStatus>,
        consumer_id: Option<&Uuid>,
        params: &PaginationParams,
    ) -> Result<(Vec<Bill>, i64), AppError> {
        let filter = "($1::text IS NULL OR status = $1) AND ($2::uuid IS NULL OR consumer_id = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM bills WHERE {filter}"))
            .bind(status)
            .bind(consumer_id)
            .fetch_one(&self.pool)
            .await?;

        let query = format!(
            r#"
            SELECT {BILL_COLUMNS}
            FROM bills
            WHERE {filter}
            ORDER BY period_end DESC, bill_number
            LIMIT $3 OFFSET $4
            "#
        );
        let bills = sqlx::query_as::<_, Bill>(&query)
            .bind(status)
            .bind(consumer_id)
            .bind(params.limit)
            .bind(params.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((bills, total))
    }

    pub async fn latest_bill_for_consumer(&self, consumer_id: &Uuid) -> Result<Option<Bill>, AppError> {
        let query = format!(
            r#"
            SELECT {BILL_COLUMNS}
            FROM bills
            WHERE consumer_id = $1
            ORDER BY period_end DESC
            LIMIT 1
            "#
        );
        let bill = sqlx::query_as::<_, Bill>(&query).bind(consumer_id).fetch_optional(&self.pool).await?;

        Ok(bill)
    }

    pub async fn outstanding_balance_for_consumer(&self, consumer_id: &Uuid) -> Result<i64, AppError> {
        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_due - amount_paid), 0)::BIGINT
            FROM bills
            WHERE consumer_id = $1 AND status <> 'paid'
            "#,
        )
        .bind(consumer_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    /// Flags unpaid and partially paid bills whose due date is before `today`.
    pub async fn mark_overdue_bills(&self, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE bills
            SET status = 'overdue'
            WHERE status IN ('unpaid', 'partially_paid')
              AND due_date < $1
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
