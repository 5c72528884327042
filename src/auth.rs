use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::user::UserRole;
use crate::service::privacy::PrivacyService;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{Object, RefOr, Response, Responses, SecurityRequirement, SecurityScheme, SecuritySchemeData};
use rocket_okapi::request::{OpenApiFromRequest, RequestHeaderInput};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const SESSION_COOKIE: &str = "user";

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub session_id: Uuid,
}

/// A signed-in admin or cashier.
#[derive(Debug, Clone)]
pub struct StaffUser(pub CurrentUser);

#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// A signed-in consumer who has agreed to the currently published privacy policy.
#[derive(Debug, Clone)]
pub struct ConsentedConsumer(pub CurrentUser);

/// Privacy policy version a rejected request still has to consent to, read by the 403 catcher.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingConsent(pub i32);

pub(crate) fn session_cookie_value(session_id: &Uuid, user_id: &Uuid) -> String {
    format!("{}:{}", session_id, user_id)
}

pub(crate) fn parse_session_cookie_value(value: &str) -> Option<(Uuid, Uuid)> {
    let (session_id_str, user_id_str) = value.split_once(':')?;
    let session_id = Uuid::parse_str(session_id_str).ok()?;
    let user_id = Uuid::parse_str(user_id_str).ok()?;
    Some((session_id, user_id))
}

fn repository(req: &Request<'_>) -> Option<PostgresRepository> {
    req.rocket().state::<PgPool>().map(|pool| PostgresRepository { pool: pool.clone() })
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let cookies = req.cookies();
        let Some((session_id, user_id)) = cookies.get_private(SESSION_COOKIE).and_then(|cookie| parse_session_cookie_value(cookie.value())) else {
            return Outcome::Error((Status::Unauthorized, AppError::Unauthorized));
        };

        let Some(repo) = repository(req) else {
            return Outcome::Error((Status::InternalServerError, AppError::Unauthorized));
        };

        match repo.get_active_session_user(&session_id, &user_id).await {
            Ok(Some(user)) => {
                let current_user = CurrentUser {
                    id: user.id,
                    email: user.email,
                    role: user.role,
                    session_id,
                };
                req.local_cache(|| Some(current_user.clone()));
                Outcome::Success(current_user)
            }
            Ok(None) => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}

async fn user_with_role<'r>(req: &'r Request<'_>, allowed: fn(UserRole) -> bool) -> RequestOutcome<CurrentUser, AppError> {
    match req.guard::<CurrentUser>().await {
        Outcome::Success(user) if allowed(user.role) => Outcome::Success(user),
        Outcome::Success(user) => {
            tracing::warn!(user_id = %user.id, role = ?user.role, uri = %req.uri(), "role not permitted for route");
            Outcome::Error((Status::Forbidden, AppError::Forbidden))
        }
        Outcome::Error(e) => Outcome::Error(e),
        Outcome::Forward(status) => Outcome::Forward(status),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for StaffUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        user_with_role(req, |role| role.is_staff()).await.map(StaffUser)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        user_with_role(req, |role| role == UserRole::Admin).await.map(AdminUser)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ConsentedConsumer {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let user = match user_with_role(req, |role| role == UserRole::Consumer).await {
            Outcome::Success(user) => user,
            Outcome::Error(e) => return Outcome::Error(e),
            Outcome::Forward(status) => return Outcome::Forward(status),
        };

        let Some(repo) = repository(req) else {
            return Outcome::Error((Status::InternalServerError, AppError::Unauthorized));
        };

        match PrivacyService::new(&repo).pending_version(&user.id).await {
            Ok(None) => Outcome::Success(ConsentedConsumer(user)),
            Ok(Some(version)) => {
                req.local_cache(|| Some(PendingConsent(version)));
                Outcome::Error((Status::Forbidden, AppError::PrivacyConsentRequired { version }))
            }
            Err(err) => Outcome::Error((Status::InternalServerError, err)),
        }
    }
}

fn cookie_security() -> RequestHeaderInput {
    let security_scheme = SecurityScheme {
        description: Some("Cookie-based authentication. Log in via POST /users/login to obtain the session cookie.".to_string()),
        data: SecuritySchemeData::ApiKey {
            name: SESSION_COOKIE.to_string(),
            location: "cookie".to_string(),
        },
        extensions: Object::default(),
    };

    let mut security_req = SecurityRequirement::new();
    security_req.insert("cookieAuth".to_string(), Vec::new());

    RequestHeaderInput::Security("cookieAuth".to_string(), security_scheme, security_req)
}

fn auth_responses(extra: &[(&str, &str)]) -> Responses {
    let mut responses = Responses::default();
    responses.responses.insert(
        "401".to_string(),
        RefOr::Object(Response {
            description: "Unauthorized - Authentication required".to_string(),
            ..Default::default()
        }),
    );
    for (code, description) in extra {
        responses.responses.insert(
            code.to_string(),
            RefOr::Object(Response {
                description: description.to_string(),
                ..Default::default()
            }),
        );
    }
    responses
}

impl<'a> OpenApiFromRequest<'a> for CurrentUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(cookie_security())
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(auth_responses(&[]))
    }
}

impl<'a> OpenApiFromRequest<'a> for StaffUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(cookie_security())
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(auth_responses(&[("403", "Forbidden - Staff role required")]))
    }
}

impl<'a> OpenApiFromRequest<'a> for AdminUser {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(cookie_security())
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(auth_responses(&[("403", "Forbidden - Admin role required")]))
    }
}

impl<'a> OpenApiFromRequest<'a> for ConsentedConsumer {
    fn from_request_input(_gen: &mut OpenApiGenerator, _name: String, _required: bool) -> rocket_okapi::Result<RequestHeaderInput> {
        Ok(cookie_security())
    }

    fn get_responses(_gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        Ok(auth_responses(&[("403", "Forbidden - Consumer role and current privacy consent required")]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_round_trips() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let parsed = parse_session_cookie_value(&session_cookie_value(&session_id, &user_id));
        assert_eq!(parsed, Some((session_id, user_id)));
    }

    #[test]
    fn parse_session_cookie_value_invalid_uuid() {
        assert!(parse_session_cookie_value("not-a-uuid:user@example.com").is_none());
    }

    #[test]
    fn parse_session_cookie_value_missing_delimiter() {
        assert!(parse_session_cookie_value("missing-delimiter").is_none());
    }
}
