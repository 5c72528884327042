use chrono::{DateTime, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Cashier,
    Consumer,
}

impl UserRole {
    /// Admins and cashiers operate the utility back office.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Cashier)
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub failed_access_count: i32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub is_locked: bool,
    pub password_changed_at: DateTime<Utc>,
    pub privacy_agreed_version: Option<i32>,
    pub privacy_agreed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// True until the password set at account creation is first replaced.
    pub fn has_initial_password(&self) -> bool {
        self.password_changed_at <= self.created_at
    }
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub is_locked: bool,
    pub lockout_end: Option<DateTime<Utc>>,
    pub password_changed_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            is_locked: user.is_locked,
            lockout_end: user.lockout_end,
            password_changed_at: user.password_changed_at,
        }
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct UserRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub role: UserRole,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// The password is older than the policy's maximum age and must be changed.
    pub password_expired: bool,
    /// A newer privacy policy has been published since the user last agreed.
    pub privacy_consent_required: bool,
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PasswordChangeRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 1))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_created_at(created_at: DateTime<Utc>) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Pump Operator".to_string(),
            email: "operator@example.com".to_string(),
            password_hash: String::new(),
            role: UserRole::Cashier,
            failed_access_count: 0,
            lockout_end: None,
            is_locked: false,
            password_changed_at: created_at,
            privacy_agreed_version: None,
            privacy_agreed_at: None,
            created_at,
        }
    }

    #[test]
    fn password_set_at_creation_is_initial() {
        let user = user_created_at(Utc::now());
        assert!(user.has_initial_password());
    }

    #[test]
    fn replaced_password_is_not_initial() {
        let mut user = user_created_at(Utc::now() - Duration::days(3));
        user.password_changed_at = user.created_at + Duration::seconds(1);
        assert!(!user.has_initial_password());
    }

    #[test]
    fn staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Cashier.is_staff());
        assert!(!UserRole::Consumer.is_staff());
    }
}
