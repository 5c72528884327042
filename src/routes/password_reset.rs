use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::ClientInfo;
use crate::models::password_reset::{PasswordResetConfirmRequest, PasswordResetValidateRequest, PasswordResetValidateResponse};
use crate::service::auth::AuthService;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use validator::Validate;

/// Check whether a reset token can still be used
#[openapi(tag = "Password Reset")]
#[post("/validate", data = "<payload>")]
pub async fn validate_password_reset_token(
    pool: &State<PgPool>,
    config: &State<Config>,
    client: ClientInfo,
    payload: Json<PasswordResetValidateRequest>,
) -> Result<Json<PasswordResetValidateResponse>, AppError> {
    if payload.validate().is_err() {
        return Ok(Json(PasswordResetValidateResponse { valid: false, email: None }));
    }

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = AuthService::new(&repo, config.inner())
        .validate_reset_token(&payload.token, &client.audit_context())
        .await?;

    Ok(Json(PasswordResetValidateResponse {
        valid: user.is_some(),
        email: user.map(|u| u.email),
    }))
}

/// Set a new password with a reset token. Clears any lockout and signs the user out everywhere.
#[openapi(tag = "Password Reset")]
#[post("/confirm", data = "<payload>")]
pub async fn confirm_password_reset(
    pool: &State<PgPool>,
    config: &State<Config>,
    client: ClientInfo,
    payload: Json<PasswordResetConfirmRequest>,
) -> Result<Status, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    AuthService::new(&repo, config.inner())
        .confirm_password_reset(&payload.token, &payload.new_password, &client.audit_context())
        .await?;

    Ok(Status::Ok)
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![validate_password_reset_token, confirm_password_reset]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::{ContentType, Status};

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_unknown_token_is_reported_invalid() {
        let client = test_client().await;
        let payload = serde_json::json!({ "token": "f".repeat(64) });

        let response = client
            .post("/api/v1/password-reset/validate")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = serde_json::from_str(&response.into_string().await.expect("response body")).expect("json body");
        assert_eq!(body["valid"], false);
    }

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_confirm_with_unknown_token_is_bad_request() {
        let client = test_client().await;
        let payload = serde_json::json!({ "token": "0".repeat(64), "new_password": "Pipeline#2026" });

        let response = client
            .post("/api/v1/password-reset/confirm")
            .header(ContentType::JSON)
            .body(payload.to_string())
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
    }
}
