use chrono::{DateTime, NaiveDate, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectionStatus {
    Scheduled,
    Disconnected,
    Reconnected,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Disconnection {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub reason: String,
    pub scheduled_for: NaiveDate,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub reconnected_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Disconnection {
    pub fn status(&self) -> DisconnectionStatus {
        match (self.disconnected_at, self.reconnected_at) {
            (_, Some(_)) => DisconnectionStatus::Reconnected,
            (Some(_), None) => DisconnectionStatus::Disconnected,
            (None, None) => DisconnectionStatus::Scheduled,
        }
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct DisconnectionRequest {
    pub consumer_id: Uuid,
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
    pub scheduled_for: NaiveDate,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct DisconnectionResponse {
    pub id: Uuid,
    pub consumer_id: Uuid,
    pub reason: String,
    pub scheduled_for: NaiveDate,
    pub status: DisconnectionStatus,
    pub disconnected_at: Option<DateTime<Utc>>,
    pub reconnected_at: Option<DateTime<Utc>>,
    pub created_by: Uuid,
}

impl From<&Disconnection> for DisconnectionResponse {
    fn from(disconnection: &Disconnection) -> Self {
        Self {
            id: disconnection.id,
            consumer_id: disconnection.consumer_id,
            reason: disconnection.reason.clone(),
            scheduled_for: disconnection.scheduled_for,
            status: disconnection.status(),
            disconnected_at: disconnection.disconnected_at,
            reconnected_at: disconnection.reconnected_at,
            created_by: disconnection.created_by,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_follows_timestamps() {
        let mut disconnection = Disconnection {
            id: Uuid::new_v4(),
            consumer_id: Uuid::new_v4(),
            reason: "Unpaid balance".to_string(),
            scheduled_for: NaiveDate::from_ymd_opt(2026, 5, 1).unwrap(),
            disconnected_at: None,
            reconnected_at: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
        };
        assert_eq!(disconnection.status(), DisconnectionStatus::Scheduled);

        disconnection.disconnected_at = Some(Utc::now());
        assert_eq!(disconnection.status(), DisconnectionStatus::Disconnected);

        disconnection.reconnected_at = Some(Utc::now());
        assert_eq!(disconnection.status(), DisconnectionStatus::Reconnected);
    }
}
