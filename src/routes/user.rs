use crate::auth::{AdminUser, CurrentUser, SESSION_COOKIE, session_cookie_value};
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::middleware::ClientInfo;
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::user::{LoginRequest, LoginResponse, PasswordChangeRequest, UserRequest, UserResponse};
use crate::service::auth::AuthService;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::time::Duration as CookieDuration;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use validator::Validate;

/// Log in with email and password. Sets the session cookie on success.
#[openapi(tag = "Users")]
#[post("/login", data = "<payload>")]
pub async fn post_user_login(
    pool: &State<PgPool>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    client: ClientInfo,
    payload: Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let service = AuthService::new(&repo, config.inner());
    let outcome = service.login(&payload.email, &payload.password, &client.audit_context()).await?;

    let cookie = Cookie::build((SESSION_COOKIE, session_cookie_value(&outcome.session_id, &outcome.user.id)))
        .path("/")
        .http_only(true)
        .secure(config.session.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::seconds(config.session.ttl_seconds))
        .build();
    cookies.add_private(cookie);

    Ok(Json(LoginResponse {
        user: UserResponse::from(&outcome.user),
        password_expired: outcome.password_expired,
        privacy_consent_required: outcome.privacy_consent_required,
    }))
}

#[openapi(tag = "Users")]
#[post("/logout")]
pub async fn post_user_logout(
    pool: &State<PgPool>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    current_user: CurrentUser,
    client: ClientInfo,
) -> Result<Status, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    AuthService::new(&repo, config.inner())
        .logout(&current_user.session_id, &current_user.id, &client.audit_context())
        .await?;

    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/").build());
    Ok(Status::Ok)
}

#[openapi(tag = "Users")]
#[get("/me")]
pub async fn get_me(pool: &State<PgPool>, current_user: CurrentUser) -> Result<Json<UserResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = repo.get_user_by_id(&current_user.id).await?.ok_or(AppError::UserNotFound)?;
    Ok(Json(UserResponse::from(&user)))
}

/// Change the signed-in user's password. The new password must satisfy the password policy.
#[openapi(tag = "Users")]
#[put("/me/password", data = "<payload>")]
pub async fn put_my_password(
    pool: &State<PgPool>,
    config: &State<Config>,
    current_user: CurrentUser,
    client: ClientInfo,
    payload: Json<PasswordChangeRequest>,
) -> Result<Status, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    AuthService::new(&repo, config.inner())
        .change_password(&current_user.id, &payload.current_password, &payload.new_password, &client.audit_context())
        .await?;

    Ok(Status::Ok)
}

#[openapi(tag = "Users")]
#[post("/", data = "<payload>")]
pub async fn post_user(
    pool: &State<PgPool>,
    config: &State<Config>,
    admin: AdminUser,
    client: ClientInfo,
    payload: Json<UserRequest>,
) -> Result<Created<Json<UserResponse>>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let user = AuthService::new(&repo, config.inner())
        .create_user(&payload, &admin.0.id, &client.audit_context())
        .await?;

    Ok(Created::new(format!("/users/{}", user.id)).body(Json(UserResponse::from(&user))))
}

#[openapi(tag = "Users")]
#[get("/?<page>&<limit>")]
pub async fn list_users(pool: &State<PgPool>, _admin: AdminUser, page: Option<i64>, limit: Option<i64>) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (users, total) = repo.list_users(&params).await?;

    Ok(Json(PaginatedResponse::new(users.iter().map(UserResponse::from).collect(), &params, total)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![post_user_login, post_user_logout, get_me, put_my_password, post_user, list_users]
}
