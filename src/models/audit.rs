use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Event types for security audit log
pub mod audit_events {
    // Authentication events
    pub const LOGIN_SUCCESS: &str = "login_success";
    pub const LOGIN_FAILED: &str = "login_failed";
    pub const LOGOUT: &str = "logout";

    // Lockout events
    pub const ACCOUNT_LOCKED: &str = "account_locked";
    pub const ACCOUNT_UNLOCKED: &str = "account_unlocked";
    pub const LOCKOUT_POLICY_UPDATED: &str = "lockout_policy_updated";

    // Password events
    pub const PASSWORD_CHANGED: &str = "password_changed";
    pub const PASSWORD_REJECTED: &str = "password_rejected";
    pub const PASSWORD_POLICY_UPDATED: &str = "password_policy_updated";
    pub const PASSWORD_RESET_ISSUED: &str = "password_reset_issued";
    pub const PASSWORD_RESET_COMPLETED: &str = "password_reset_completed";
    pub const PASSWORD_RESET_TOKEN_INVALID: &str = "password_reset_token_invalid";

    // Account events
    pub const USER_CREATED: &str = "user_created";
    pub const PRIVACY_CONSENT_GIVEN: &str = "privacy_consent_given";
}

/// A security event about to be recorded.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub user_id: Option<&'a Uuid>,
    pub event_type: &'a str,
    pub success: bool,
    pub metadata: Option<JsonValue>,
}

impl<'a> AuditEvent<'a> {
    pub fn new(user_id: Option<&'a Uuid>, event_type: &'a str, success: bool) -> Self {
        AuditEvent {
            user_id,
            event_type,
            success,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Option<JsonValue>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SecurityAuditEntry {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct SecurityAuditEntryResponse {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub success: bool,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

impl From<&SecurityAuditEntry> for SecurityAuditEntryResponse {
    fn from(entry: &SecurityAuditEntry) -> Self {
        Self {
            id: entry.id,
            user_id: entry.user_id,
            event_type: entry.event_type.clone(),
            success: entry.success,
            ip_address: entry.ip_address.clone(),
            user_agent: entry.user_agent.clone(),
            metadata: entry.metadata.clone(),
            created_at: entry.created_at,
        }
    }
}
