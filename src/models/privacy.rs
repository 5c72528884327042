use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrivacyPolicy {
    pub id: Uuid,
    pub version: i32,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PrivacyPolicyResponse {
    pub version: i32,
    pub title: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

impl From<&PrivacyPolicy> for PrivacyPolicyResponse {
    fn from(policy: &PrivacyPolicy) -> Self {
        Self {
            version: policy.version,
            title: policy.title.clone(),
            content: policy.content.clone(),
            published_at: policy.published_at,
        }
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PrivacyConsentRequest {
    #[validate(range(min = 1))]
    pub version: i32,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PrivacyStatusResponse {
    pub published_version: Option<i32>,
    pub agreed_version: Option<i32>,
    pub agreed_at: Option<DateTime<Utc>>,
    pub consent_required: bool,
}
