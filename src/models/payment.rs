use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Card,
    MobileMoney,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub receipt_number: String,
    pub recorded_by: Uuid,
    pub paid_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PaymentRequest {
    pub bill_id: Uuid,
    #[validate(range(min = 1))]
    pub amount: i64,
    pub method: PaymentMethod,
    #[validate(length(min = 1, max = 64))]
    pub reference: Option<String>,
}

/// Receipt data for a recorded payment.
#[derive(Serialize, Debug, JsonSchema)]
pub struct PaymentResponse {
    pub id: Uuid,
    pub bill_id: Uuid,
    pub amount: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub receipt_number: String,
    pub recorded_by: Uuid,
    pub paid_at: DateTime<Utc>,
}

impl From<&Payment> for PaymentResponse {
    fn from(payment: &Payment) -> Self {
        Self {
            id: payment.id,
            bill_id: payment.bill_id,
            amount: payment.amount,
            method: payment.method,
            reference: payment.reference.clone(),
            receipt_number: payment.receipt_number.clone(),
            recorded_by: payment.recorded_by,
            paid_at: payment.paid_at,
        }
    }
}
