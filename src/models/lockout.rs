use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Stored lockout policy row. Only the first row is ever consulted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockoutPolicy {
    pub id: i32,
    pub max_failed_access_attempts: i32,
    pub lockout_duration_minutes: i32,
    pub updated_at: DateTime<Utc>,
}

/// Effective thresholds, either read from storage or taken from the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct LockoutSettings {
    pub max_failed_access_attempts: i32,
    pub lockout_duration_minutes: i32,
}

impl From<&LockoutPolicy> for LockoutSettings {
    fn from(policy: &LockoutPolicy) -> Self {
        Self {
            max_failed_access_attempts: policy.max_failed_access_attempts,
            lockout_duration_minutes: policy.lockout_duration_minutes,
        }
    }
}

/// Lockout-relevant slice of a user row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct LockoutState {
    pub user_id: Uuid,
    pub failed_access_count: i32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub is_locked: bool,
}

impl LockoutState {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            failed_access_count: 0,
            lockout_end: None,
            is_locked: false,
        }
    }
}

impl From<&crate::models::user::User> for LockoutState {
    fn from(user: &crate::models::user::User) -> Self {
        Self {
            user_id: user.id,
            failed_access_count: user.failed_access_count,
            lockout_end: user.lockout_end,
            is_locked: user.is_locked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedLoginOutcome {
    /// The threshold was reached by this attempt.
    Locked { until: DateTime<Utc>, message: String },
    InvalidCredentials,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct LockoutPolicyRequest {
    #[validate(range(min = 1, max = 100))]
    pub max_failed_access_attempts: i32,
    #[validate(range(min = 1, max = 10080))]
    pub lockout_duration_minutes: i32,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LockoutPolicyResponse {
    pub max_failed_access_attempts: i32,
    pub lockout_duration_minutes: i32,
    /// None when the defaults are in effect.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LockedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub lockout_end: DateTime<Utc>,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LockedUserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub lockout_end: DateTime<Utc>,
}

impl From<&LockedUser> for LockedUserResponse {
    fn from(user: &LockedUser) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            lockout_end: user.lockout_end,
        }
    }
}
