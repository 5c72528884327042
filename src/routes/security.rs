use crate::auth::AdminUser;
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::ClientInfo;
use crate::models::audit::SecurityAuditEntryResponse;
use crate::models::lockout::{LockedUserResponse, LockoutPolicyRequest, LockoutPolicyResponse};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::password_policy::{PasswordPolicyRequest, PasswordPolicyResponse};
use crate::models::password_reset::PasswordResetIssuedResponse;
use crate::service::auth::AuthService;
use chrono::Utc;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Effective lockout policy. `updated_at` is empty while the configured defaults apply.
#[openapi(tag = "Security")]
#[get("/lockout-policy")]
pub async fn get_lockout_policy(pool: &State<PgPool>, config: &State<Config>, _admin: AdminUser) -> Result<Json<LockoutPolicyResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (settings, updated_at) = AuthService::new(&repo, config.inner()).lockout_settings().await?;

    Ok(Json(LockoutPolicyResponse {
        max_failed_access_attempts: settings.max_failed_access_attempts,
        lockout_duration_minutes: settings.lockout_duration_minutes,
        updated_at,
    }))
}

#[openapi(tag = "Security")]
#[put("/lockout-policy", data = "<payload>")]
pub async fn put_lockout_policy(
    pool: &State<PgPool>,
    config: &State<Config>,
    admin: AdminUser,
    client: ClientInfo,
    payload: Json<LockoutPolicyRequest>,
) -> Result<Json<LockoutPolicyResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (settings, updated_at) = AuthService::new(&repo, config.inner())
        .update_lockout_policy(&payload, &admin.0.id, &client.audit_context())
        .await?;

    Ok(Json(LockoutPolicyResponse {
        max_failed_access_attempts: settings.max_failed_access_attempts,
        lockout_duration_minutes: settings.lockout_duration_minutes,
        updated_at: Some(updated_at),
    }))
}

#[openapi(tag = "Security")]
#[get("/password-policy")]
pub async fn get_password_policy(pool: &State<PgPool>, config: &State<Config>, _admin: AdminUser) -> Result<Json<PasswordPolicyResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let policy = AuthService::new(&repo, config.inner()).current_password_policy().await?;
    Ok(Json(PasswordPolicyResponse::from(&policy)))
}

#[openapi(tag = "Security")]
#[put("/password-policy", data = "<payload>")]
pub async fn put_password_policy(
    pool: &State<PgPool>,
    config: &State<Config>,
    admin: AdminUser,
    client: ClientInfo,
    payload: Json<PasswordPolicyRequest>,
) -> Result<Json<PasswordPolicyResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let policy = AuthService::new(&repo, config.inner())
        .update_password_policy(&payload, &admin.0.id, &client.audit_context())
        .await?;

    Ok(Json(PasswordPolicyResponse::from(&policy)))
}

/// Users whose lockout has not yet expired.
#[openapi(tag = "Security")]
#[get("/locked-users")]
pub async fn list_locked_users(pool: &State<PgPool>, _admin: AdminUser) -> Result<Json<Vec<LockedUserResponse>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let users = repo.list_locked_users(Utc::now()).await?;
    Ok(Json(users.iter().map(LockedUserResponse::from).collect()))
}

#[openapi(tag = "Security")]
#[post("/users/<id>/unlock")]
pub async fn unlock_user(pool: &State<PgPool>, config: &State<Config>, admin: AdminUser, client: ClientInfo, id: &str) -> Result<Status, AppError> {
    let user_id = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    AuthService::new(&repo, config.inner())
        .unlock_user(&user_id, &admin.0.id, &client.audit_context())
        .await?;

    Ok(Status::Ok)
}

/// Issue a one-time password reset token for a user. The token is shown once and must be handed over out of band.
#[openapi(tag = "Security")]
#[post("/users/<id>/password-reset")]
pub async fn issue_password_reset(
    pool: &State<PgPool>,
    config: &State<Config>,
    admin: AdminUser,
    client: ClientInfo,
    id: &str,
) -> Result<Json<PasswordResetIssuedResponse>, AppError> {
    let user_id = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (token, expires_at) = AuthService::new(&repo, config.inner())
        .issue_password_reset(&user_id, &admin.0.id, &client.audit_context())
        .await?;

    Ok(Json(PasswordResetIssuedResponse { user_id, token, expires_at }))
}

/// Security events, newest first. `user_id` narrows the log to one account.
#[openapi(tag = "Security")]
#[get("/audit-log?<user_id>&<page>&<limit>")]
pub async fn list_audit_log(
    pool: &State<PgPool>,
    _admin: AdminUser,
    user_id: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<SecurityAuditEntryResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let user_id = user_id.as_deref().map(Uuid::parse_str).transpose()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (entries, total) = repo.list_security_audit_log(user_id.as_ref(), &params).await?;

    Ok(Json(PaginatedResponse::new(
        entries.iter().map(SecurityAuditEntryResponse::from).collect(),
        &params,
        total,
    )))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![
        get_lockout_policy,
        put_lockout_policy,
        get_password_policy,
        put_password_policy,
        list_locked_users,
        unlock_user,
        issue_password_reset,
        list_audit_log
    ]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::{ContentType, Status};

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_lockout_policy_requires_session() {
        let client = test_client().await;
        let response = client.get("/api/v1/admin/security/lockout-policy").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_anonymous_policy_update_is_refused() {
        let client = test_client().await;
        let payload = serde_json::json!({ "max_failed_access_attempts": 1, "lockout_duration_minutes": 1 });

        let response = client
            .put("/api/v1/admin/security/lockout-policy")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Unauthorized);
    }
}
