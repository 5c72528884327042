use crate::database::bill::BILL_COLUMNS;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::bill::Bill;
use crate::models::payment::{Payment, PaymentRequest};
use crate::service::billing;
use uuid::Uuid;

const PAYMENT_COLUMNS: &str = "id, bill_id, amount, method, reference, receipt_number, recorded_by, paid_at";

impl PostgresRepository {
    /// Inserts the payment and updates the bill's paid total and status in one transaction.
    pub async fn apply_payment(&self, request: &PaymentRequest, recorded_by: &Uuid, receipt_number: &str) -> Result<(Payment, Bill), AppError> {
        let mut tx = self.pool.begin().await?;

        let bill = sqlx::query_as::<_, Bill>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1 FOR UPDATE"))
            .bind(request.bill_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Bill not found".to_string()))?;

        let (amount_paid, status) = billing::apply_payment(&bill, request.amount)?;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            INSERT INTO payments (bill_id, amount, method, reference, receipt_number, recorded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(bill.id)
        .bind(request.amount)
        .bind(request.method)
        .bind(&request.reference)
        .bind(receipt_number)
        .bind(recorded_by)
        .fetch_one(&mut *tx)
        .await?;

        let bill = sqlx::query_as::<_, Bill>(&format!(
            r#"
            UPDATE bills
            SET amount_paid = $1, status = $2
            WHERE id = $3
            RETURNING {BILL_COLUMNS}
            "#
        ))
        .bind(amount_paid)
        .bind(status)
        .bind(bill.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((payment, bill))
    }

    pub async fn list_payments_for_bill(&self, bill_id: &Uuid) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE bill_id = $1 ORDER BY paid_at"))
            .bind(bill_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    pub async fn get_payment_by_receipt(&self, receipt_number: &str) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE receipt_number = $1"))
            .bind(receipt_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }
}
