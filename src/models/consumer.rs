use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConsumerStatus {
    Active,
    Disconnected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Consumer {
    pub id: Uuid,
    pub account_number: String,
    pub name: String,
    pub address: String,
    pub meter_number: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub user_id: Option<Uuid>,
    pub status: ConsumerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct ConsumerRequest {
    #[validate(length(min = 3, max = 32))]
    pub account_number: String,
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub address: String,
    #[validate(length(min = 1, max = 32))]
    pub meter_number: String,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub contact_phone: Option<String>,
    /// Portal login linked to this service account, if any.
    pub user_id: Option<Uuid>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct ConsumerResponse {
    pub id: Uuid,
    pub account_number: String,
    pub name: String,
    pub address: String,
    pub meter_number: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub user_id: Option<Uuid>,
    pub status: ConsumerStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Consumer> for ConsumerResponse {
    fn from(consumer: &Consumer) -> Self {
        Self {
            id: consumer.id,
            account_number: consumer.account_number.clone(),
            name: consumer.name.clone(),
            address: consumer.address.clone(),
            meter_number: consumer.meter_number.clone(),
            contact_email: consumer.contact_email.clone(),
            contact_phone: consumer.contact_phone.clone(),
            user_id: consumer.user_id,
            status: consumer.status,
            created_at: consumer.created_at,
        }
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct ConsumerAccountResponse {
    #[serde(flatten)]
    pub consumer: ConsumerResponse,
    pub outstanding_balance: i64,
}
