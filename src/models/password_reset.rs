use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

/// Password reset record stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PasswordReset {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

/// Issued to an administrator, who hands the token to the user out of band.
#[derive(Debug, Serialize, JsonSchema)]
pub struct PasswordResetIssuedResponse {
    pub user_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetValidateRequest {
    #[validate(length(equal = 64))]
    pub token: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PasswordResetValidateResponse {
    pub valid: bool,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct PasswordResetConfirmRequest {
    #[validate(length(equal = 64))]
    pub token: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

impl PasswordReset {
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_used()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reset(expires_in: Duration, used: bool) -> PasswordReset {
        PasswordReset {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            expires_at: Utc::now() + expires_in,
            used_at: used.then(Utc::now),
        }
    }

    #[test]
    fn fresh_unused_token_is_valid() {
        assert!(reset(Duration::minutes(30), false).is_valid());
    }

    #[test]
    fn expired_or_used_tokens_are_invalid() {
        assert!(!reset(Duration::minutes(-1), false).is_valid());
        assert!(!reset(Duration::minutes(30), true).is_valid());
    }
}
