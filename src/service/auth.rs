use crate::Config;
use crate::database::audit::{AuditContext, AuditRepository, record_audit_event_best_effort};
use crate::database::lockout::LockoutRepository;
use crate::database::password_policy::PasswordPolicyRepository;
use crate::database::password_reset::{generate_reset_token, hash_reset_token};
use crate::database::postgres_repository::PostgresRepository;
use crate::database::privacy::PrivacyRepository;
use crate::database::session::SessionRepository;
use crate::database::user::{UserLookupRepository, dummy_verify, hash_password, verify_user_password};
use crate::error::app_error::AppError;
use crate::models::audit::{AuditEvent, audit_events};
use crate::models::lockout::{FailedLoginOutcome, LockoutPolicyRequest, LockoutSettings, LockoutState};
use crate::models::password_policy::{PasswordPolicy, PasswordPolicyRequest, PasswordVerdict};
use crate::models::user::{User, UserRequest};
use crate::service::lockout::{LockoutService, is_locked, lockout_message};
use crate::service::password_policy::{PasswordPolicyService, check_composition};
use crate::service::privacy::requires_consent;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A successful login: the session to put in the cookie plus the flags the client must act on.
pub struct LoginOutcome {
    pub session_id: Uuid,
    pub user: User,
    pub password_expired: bool,
    pub privacy_consent_required: bool,
}

/// The minimum age does not hold back replacing the password an account was created with.
pub fn change_blocked_until(policy: &PasswordPolicy, user: &User, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if user.has_initial_password() {
        return None;
    }
    policy.change_allowed_after(user.password_changed_at, now)
}

pub struct AuthService<'a, R = PostgresRepository> {
    repo: &'a R,
    config: &'a Config,
}

impl<'a, R> AuthService<'a, R>
where
    R: UserLookupRepository + SessionRepository + LockoutRepository + PasswordPolicyRepository + PrivacyRepository + AuditRepository + Sync,
{
    pub fn new(repo: &'a R, config: &'a Config) -> Self {
        AuthService { repo, config }
    }

    fn lockout(&self) -> LockoutService<'a, R> {
        LockoutService::new(self.repo, &self.config.security)
    }

    fn password_policy(&self) -> PasswordPolicyService<'a, R> {
        PasswordPolicyService::new(self.repo, &self.config.security)
    }

    /// A locked account is refused before the password is checked.
    pub async fn login(&self, email: &str, password: &str, context: &AuditContext) -> Result<LoginOutcome, AppError> {
        let Some(user) = self.repo.get_user_by_email(email).await? else {
            dummy_verify(password).await;
            self.audit(None, audit_events::LOGIN_FAILED, false, context, Some(serde_json::json!({ "reason": "unknown_email" })))
                .await;
            return Err(AppError::InvalidCredentials);
        };

        let now = Utc::now();
        let mut state = LockoutState::from(&user);
        if is_locked(&state, now)
            && let Some(until) = state.lockout_end
        {
            self.audit(Some(&user.id), audit_events::LOGIN_FAILED, false, context, Some(serde_json::json!({ "reason": "account_locked" })))
                .await;
            return Err(AppError::AccountLocked {
                until,
                message: lockout_message(until, now),
            });
        }

        match verify_user_password(&user, password).await {
            Ok(()) => {}
            Err(AppError::InvalidCredentials) => return Err(self.handle_failed_login(&mut state, context).await?),
            Err(e) => return Err(e),
        }

        self.lockout().reset_lockout(&mut state).await?;

        let expires_at = now + Duration::seconds(self.config.session.ttl_seconds);
        let session = self
            .repo
            .create_session(&user.id, expires_at, context.user_agent.as_deref(), context.ip_address.as_deref())
            .await?;

        let password_expired = self.password_policy().policy().await?.is_expired(user.password_changed_at, now);
        let published_version = self.repo.get_published_privacy_version().await?;
        let privacy_consent_required = requires_consent(user.privacy_agreed_version, published_version);

        self.audit(Some(&user.id), audit_events::LOGIN_SUCCESS, true, context, None).await;

        Ok(LoginOutcome {
            session_id: session.id,
            user,
            password_expired,
            privacy_consent_required,
        })
    }

    /// Records the failure and returns the error the caller should surface.
    async fn handle_failed_login(&self, state: &mut LockoutState, context: &AuditContext) -> Result<AppError, AppError> {
        let user_id = state.user_id;
        match self.lockout().record_failed_attempt(state).await? {
            FailedLoginOutcome::Locked { until, message } => {
                self.audit(Some(&user_id), audit_events::ACCOUNT_LOCKED, false, context, Some(serde_json::json!({ "lockout_end": until })))
                    .await;
                Ok(AppError::AccountLocked { until, message })
            }
            FailedLoginOutcome::InvalidCredentials => {
                self.audit(
                    Some(&user_id),
                    audit_events::LOGIN_FAILED,
                    false,
                    context,
                    Some(serde_json::json!({ "reason": "invalid_password", "failed_access_count": state.failed_access_count })),
                )
                .await;
                Ok(AppError::InvalidCredentials)
            }
        }
    }

    /// Audit writes never fail the request they describe.
    async fn audit(&self, user_id: Option<&Uuid>, event_type: &str, success: bool, context: &AuditContext, metadata: Option<JsonValue>) {
        let event = AuditEvent::new(user_id, event_type, success).with_metadata(metadata);
        record_audit_event_best_effort(self.repo, &event, context).await;
    }
}

impl<'a> AuthService<'a, PostgresRepository> {
    pub async fn logout(&self, session_id: &Uuid, user_id: &Uuid, context: &AuditContext) -> Result<(), AppError> {
        self.repo.delete_session(session_id).await?;
        self.audit(Some(user_id), audit_events::LOGOUT, true, context, None).await;
        Ok(())
    }

    pub async fn create_user(&self, request: &UserRequest, created_by: &Uuid, context: &AuditContext) -> Result<User, AppError> {
        let policy = self.password_policy().policy().await?;
        if let Some(rejection) = check_composition(&request.password, &policy) {
            return Err(AppError::PasswordPolicyViolation(rejection.to_string()));
        }

        let password_hash = hash_off_thread(&request.password).await?;
        let user = self.repo.create_user(&request.name, &request.email, &password_hash, request.role).await?;
        self.password_policy().save_password_history(&user.id, &password_hash).await?;

        self.audit(
            Some(&user.id),
            audit_events::USER_CREATED,
            true,
            context,
            Some(serde_json::json!({ "created_by": created_by, "role": user.role })),
        )
        .await;

        Ok(user)
    }

    pub async fn change_password(&self, user_id: &Uuid, current_password: &str, new_password: &str, context: &AuditContext) -> Result<(), AppError> {
        let user = self.repo.get_user_by_id(user_id).await?.ok_or(AppError::UserNotFound)?;
        verify_user_password(&user, current_password).await?;

        let policy = self.password_policy().policy().await?;
        if let Some(allowed_at) = change_blocked_until(&policy, &user, Utc::now()) {
            return Err(AppError::PasswordPolicyViolation(format!(
                "password was changed too recently; it can be changed again after {}",
                allowed_at.to_rfc3339()
            )));
        }

        self.ensure_new_password(user_id, new_password, context).await?;
        self.apply_new_password(user_id, new_password).await?;
        self.audit(Some(user_id), audit_events::PASSWORD_CHANGED, true, context, None).await;

        Ok(())
    }

    /// Issues a one-time reset token. The plain token is only ever returned here.
    pub async fn issue_password_reset(&self, user_id: &Uuid, issued_by: &Uuid, context: &AuditContext) -> Result<(String, DateTime<Utc>), AppError> {
        self.repo.get_user_by_id(user_id).await?.ok_or(AppError::UserNotFound)?;

        let (token, token_hash) = generate_reset_token();
        let expires_at = Utc::now() + Duration::minutes(self.config.security.reset_token_ttl_minutes);
        self.repo.create_password_reset(user_id, &token_hash, expires_at).await?;

        self.audit(
            Some(user_id),
            audit_events::PASSWORD_RESET_ISSUED,
            true,
            context,
            Some(serde_json::json!({ "issued_by": issued_by, "expires_at": expires_at })),
        )
        .await;

        Ok((token, expires_at))
    }

    /// The user a token belongs to, if the token is still usable.
    pub async fn validate_reset_token(&self, token: &str, context: &AuditContext) -> Result<Option<User>, AppError> {
        let reset = self.repo.get_password_reset_by_token(&hash_reset_token(token)).await?;
        match reset {
            Some(reset) if reset.is_valid() => self.repo.get_user_by_id(&reset.user_id).await,
            Some(reset) => {
                let reason = if reset.is_expired() { "expired" } else { "used" };
                self.audit(
                    Some(&reset.user_id),
                    audit_events::PASSWORD_RESET_TOKEN_INVALID,
                    false,
                    context,
                    Some(serde_json::json!({ "reason": reason })),
                )
                .await;
                Ok(None)
            }
            None => {
                self.audit(None, audit_events::PASSWORD_RESET_TOKEN_INVALID, false, context, Some(serde_json::json!({ "reason": "unknown" })))
                    .await;
                Ok(None)
            }
        }
    }

    /// Sets the new password, clears any lockout and ends every session of the user.
    pub async fn confirm_password_reset(&self, token: &str, new_password: &str, context: &AuditContext) -> Result<(), AppError> {
        let invalid_token = || AppError::BadRequest("Invalid or expired reset token".to_string());

        let reset = self.repo.get_password_reset_by_token(&hash_reset_token(token)).await?;
        let reset = match reset {
            Some(reset) if reset.is_valid() => reset,
            other => {
                self.audit(
                    other.as_ref().map(|r| &r.user_id),
                    audit_events::PASSWORD_RESET_TOKEN_INVALID,
                    false,
                    context,
                    None,
                )
                .await;
                return Err(invalid_token());
            }
        };

        self.ensure_new_password(&reset.user_id, new_password, context).await?;
        let password_hash = hash_off_thread(new_password).await?;
        if !self.repo.complete_password_reset(&reset.id, &reset.user_id, &password_hash).await? {
            return Err(invalid_token());
        }
        self.password_policy().save_password_history(&reset.user_id, &password_hash).await?;

        let mut state = LockoutState::new(reset.user_id);
        self.lockout().reset_lockout(&mut state).await?;
        let sessions = self.repo.invalidate_all_user_sessions(&reset.user_id).await?;

        self.audit(
            Some(&reset.user_id),
            audit_events::PASSWORD_RESET_COMPLETED,
            true,
            context,
            Some(serde_json::json!({ "sessions_invalidated": sessions })),
        )
        .await;

        Ok(())
    }

    pub async fn unlock_user(&self, user_id: &Uuid, unlocked_by: &Uuid, context: &AuditContext) -> Result<(), AppError> {
        let mut state = self.repo.get_lockout_state(user_id).await?.ok_or(AppError::UserNotFound)?;
        let was_locked = is_locked(&state, Utc::now());
        self.lockout().reset_lockout(&mut state).await?;

        self.audit(
            Some(user_id),
            audit_events::ACCOUNT_UNLOCKED,
            true,
            context,
            Some(serde_json::json!({ "unlocked_by": unlocked_by, "was_locked": was_locked })),
        )
        .await;

        Ok(())
    }

    pub async fn lockout_settings(&self) -> Result<(LockoutSettings, Option<DateTime<Utc>>), AppError> {
        let updated_at = self.repo.get_lockout_policy().await?.map(|policy| policy.updated_at);
        Ok((self.lockout().get_policy().await?, updated_at))
    }

    pub async fn update_lockout_policy(&self, request: &LockoutPolicyRequest, updated_by: &Uuid, context: &AuditContext) -> Result<(LockoutSettings, DateTime<Utc>), AppError> {
        let policy = self.repo.upsert_lockout_policy(request).await?;
        self.audit(
            Some(updated_by),
            audit_events::LOCKOUT_POLICY_UPDATED,
            true,
            context,
            Some(serde_json::json!({
                "max_failed_access_attempts": policy.max_failed_access_attempts,
                "lockout_duration_minutes": policy.lockout_duration_minutes,
            })),
        )
        .await;

        Ok((LockoutSettings::from(&policy), policy.updated_at))
    }

    pub async fn current_password_policy(&self) -> Result<PasswordPolicy, AppError> {
        self.password_policy().policy().await
    }

    pub async fn update_password_policy(&self, request: &PasswordPolicyRequest, updated_by: &Uuid, context: &AuditContext) -> Result<PasswordPolicy, AppError> {
        let policy = self.repo.upsert_password_policy(request).await?;
        self.audit(
            Some(updated_by),
            audit_events::PASSWORD_POLICY_UPDATED,
            true,
            context,
            Some(serde_json::json!({
                "min_length": policy.min_length,
                "require_complexity": policy.require_complexity,
                "password_history_count": policy.password_history_count,
            })),
        )
        .await;

        Ok(policy)
    }

    async fn ensure_new_password(&self, user_id: &Uuid, candidate: &str, context: &AuditContext) -> Result<(), AppError> {
        match self.password_policy().validate_password(user_id, candidate).await? {
            PasswordVerdict::Accepted => Ok(()),
            PasswordVerdict::Rejected(rejection) => {
                let reason = rejection.to_string();
                self.audit(Some(user_id), audit_events::PASSWORD_REJECTED, false, context, Some(serde_json::json!({ "reason": reason })))
                    .await;
                Err(AppError::PasswordPolicyViolation(reason))
            }
        }
    }

    async fn apply_new_password(&self, user_id: &Uuid, password: &str) -> Result<(), AppError> {
        let password_hash = hash_off_thread(password).await?;
        self.repo.update_password_hash(user_id, &password_hash).await?;
        self.password_policy().save_password_history(user_id, &password_hash).await
    }
}

async fn hash_off_thread(password: &str) -> Result<String, AppError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password)).await?
}
