use chrono::{DateTime, Duration, Utc};
use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;
use std::fmt;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PasswordPolicy {
    pub min_length: i32,
    pub require_complexity: bool,
    pub password_history_count: i32,
    pub min_password_age_days: i32,
    /// Zero disables expiry.
    pub max_password_age_days: i32,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PasswordPolicy {
    pub const DEFAULT_HISTORY_COUNT: i32 = 5;

    /// Number of previous hashes kept and compared against.
    pub fn history_count(&self) -> i32 {
        if self.password_history_count > 0 {
            self.password_history_count
        } else {
            Self::DEFAULT_HISTORY_COUNT
        }
    }

    pub fn is_expired(&self, changed_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.max_password_age_days > 0 && now >= changed_at + Duration::days(self.max_password_age_days as i64)
    }

    /// Earliest moment a user may change the password again, if still in the future.
    pub fn change_allowed_after(&self, changed_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.min_password_age_days <= 0 {
            return None;
        }
        let allowed_at = changed_at + Duration::days(self.min_password_age_days as i64);
        (allowed_at > now).then_some(allowed_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterClass {
    Uppercase,
    Lowercase,
    Digit,
    Symbol,
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacterClass::Uppercase => "an uppercase letter",
            CharacterClass::Lowercase => "a lowercase letter",
            CharacterClass::Digit => "a digit",
            CharacterClass::Symbol => "a symbol",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordRejection {
    TooShort { min_length: i32 },
    MissingCharacterClasses(Vec<CharacterClass>),
    RecentlyUsed { history_count: i32 },
}

impl fmt::Display for PasswordRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordRejection::TooShort { min_length } => write!(f, "password must be at least {} characters long", min_length),
            PasswordRejection::MissingCharacterClasses(classes) => {
                let names: Vec<String> = classes.iter().map(ToString::to_string).collect();
                write!(f, "password must contain {}", names.join(", "))
            }
            PasswordRejection::RecentlyUsed { history_count } => {
                write!(f, "password matches one of the last {} passwords", history_count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordVerdict {
    Accepted,
    Rejected(PasswordRejection),
}

impl PasswordVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PasswordVerdict::Accepted)
    }
}

#[derive(Deserialize, Debug, Validate, JsonSchema)]
pub struct PasswordPolicyRequest {
    #[validate(range(min = 4, max = 128))]
    pub min_length: i32,
    pub require_complexity: bool,
    #[validate(range(min = 1, max = 24))]
    pub password_history_count: i32,
    #[validate(range(min = 0, max = 365))]
    pub min_password_age_days: i32,
    #[validate(range(min = 0, max = 3650))]
    pub max_password_age_days: i32,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct PasswordPolicyResponse {
    pub min_length: i32,
    pub require_complexity: bool,
    pub password_history_count: i32,
    pub min_password_age_days: i32,
    pub max_password_age_days: i32,
    /// None when the defaults are in effect.
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&PasswordPolicy> for PasswordPolicyResponse {
    fn from(policy: &PasswordPolicy) -> Self {
        Self {
            min_length: policy.min_length,
            require_complexity: policy.require_complexity,
            password_history_count: policy.history_count(),
            min_password_age_days: policy.min_password_age_days,
            max_password_age_days: policy.max_password_age_days,
            updated_at: policy.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PasswordPolicy {
        PasswordPolicy {
            min_length: 8,
            require_complexity: true,
            password_history_count: 3,
            min_password_age_days: 1,
            max_password_age_days: 90,
            updated_at: None,
        }
    }

    #[test]
    fn history_count_falls_back_to_five() {
        let policy = PasswordPolicy {
            password_history_count: 0,
            ..policy()
        };
        assert_eq!(policy.history_count(), 5);
    }

    #[test]
    fn expiry_respects_max_age() {
        let now = Utc::now();
        assert!(!policy().is_expired(now - Duration::days(89), now));
        assert!(policy().is_expired(now - Duration::days(90), now));

        let never = PasswordPolicy {
            max_password_age_days: 0,
            ..policy()
        };
        assert!(!never.is_expired(now - Duration::days(10_000), now));
    }

    #[test]
    fn min_age_blocks_immediate_change() {
        let now = Utc::now();
        assert!(policy().change_allowed_after(now - Duration::hours(2), now).is_some());
        assert!(policy().change_allowed_after(now - Duration::days(2), now).is_none());
    }

    #[test]
    fn rejection_messages_are_readable() {
        let rejection = PasswordRejection::MissingCharacterClasses(vec![CharacterClass::Digit, CharacterClass::Symbol]);
        assert_eq!(rejection.to_string(), "password must contain a digit, a symbol");
    }
}
