use chrono::{DateTime, NaiveDate, Utc};
use rocket::FromFormField;
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, FromFormField, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[field(value = "unpaid")]
    Unpaid,
    #[field(value = "partially_paid")]
    PartiallyPaid,
    #[field(value = "paid")]
    Paid,
    #[field(value = "overdue")]
    Overdue,
}

impl BillStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, BillStatus::Paid)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Bill {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub bill_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub previous_reading: i32,
    pub current_reading: i32,
    pub consumption_m3: i32,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub created_at: DateTime<Utc>,
}

impl Bill {
    pub fn outstanding(&self) -> i64 {
        (self.amount_due - self.amount_paid).max(0)
    }
}

/// Values computed by the billing service before a bill is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBill {
    pub consumer_id: Uuid,
    pub bill_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub previous_reading: i32,
    pub current_reading: i32,
    pub consumption_m3: i32,
    pub amount_due: i64,
    pub due_date: NaiveDate,
}

fn validate_period(request: &BillRequest) -> Result<(), ValidationError> {
    if request.period_end < request.period_start {
        return Err(ValidationError::new("period_end_before_period_start"));
    }
    Ok(())
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
#[validate(schema(function = "validate_period"))]
pub struct BillRequest {
    pub consumer_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    /// Defaults to the current reading of the consumer's latest bill, or zero.
    #[validate(range(min = 0))]
    pub previous_reading: Option<i32>,
    #[validate(range(min = 0))]
    pub current_reading: i32,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct BillResponse {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub bill_number: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub previous_reading: i32,
    pub current_reading: i32,
    pub consumption_m3: i32,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub outstanding: i64,
    pub due_date: NaiveDate,
    pub status: BillStatus,
}

impl From<&Bill> for BillResponse {
    fn from(bill: &Bill) -> Self {
        Self {
            id: bill.id,
            consumer_id: bill.consumer_id,
            bill_number: bill.bill_number.clone(),
            period_start: bill.period_start,
            period_end: bill.period_end,
            previous_reading: bill.previous_reading,
            current_reading: bill.current_reading,
            consumption_m3: bill.consumption_m3,
            amount_due: bill.amount_due,
            amount_paid: bill.amount_paid,
            outstanding: bill.outstanding(),
            due_date: bill.due_date,
            status: bill.status,
        }
    }
}
