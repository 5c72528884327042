use crate::auth::CurrentUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::ClientInfo;
use crate::models::privacy::{PrivacyConsentRequest, PrivacyPolicyResponse, PrivacyStatusResponse};
use crate::service::privacy::PrivacyService;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use validator::Validate;

/// The currently published privacy policy
#[openapi(tag = "Privacy")]
#[get("/current")]
pub async fn get_current_policy(pool: &State<PgPool>) -> Result<Json<PrivacyPolicyResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let policy = repo
        .get_published_privacy_policy()
        .await?
        .ok_or_else(|| AppError::NotFound("No privacy policy has been published".to_string()))?;

    Ok(Json(PrivacyPolicyResponse::from(&policy)))
}

#[openapi(tag = "Privacy")]
#[get("/status")]
pub async fn get_consent_status(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<PrivacyStatusResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let status = PrivacyService::new(&repo).status(&current_user.id).await?;
    Ok(Json(status))
}

/// Agree to the published privacy policy. The version must match the one currently published.
#[openapi(tag = "Privacy")]
#[post("/consent", data = "<payload>")]
pub async fn post_consent(
    pool: &State<PgPool>,
    current_user: CurrentUser,
    client: ClientInfo,
    payload: Json<PrivacyConsentRequest>,
) -> Result<Json<PrivacyStatusResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let status = PrivacyService::new(&repo)
        .consent(&current_user.id, payload.version, &client.audit_context())
        .await?;

    Ok(Json(status))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_current_policy, get_consent_status, post_consent]
}
