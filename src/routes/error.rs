use crate::auth::PendingConsent;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, catch};

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent_version: Option<i32>,
}

impl Error {
    fn new(message: &str) -> Json<Self> {
        Json(Error {
            message: message.to_string(),
            consent_version: None,
        })
    }
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Json<Error> {
    Error::new("Authentication required")
}

/// Also reached when the privacy gate rejects a consumer; the pending version is reported so the client can prompt for consent.
#[catch(403)]
pub fn forbidden(req: &Request) -> Json<Error> {
    match req.local_cache(|| None::<PendingConsent>) {
        Some(PendingConsent(version)) => Json(Error {
            message: format!("Privacy policy version {} must be accepted before continuing", version),
            consent_version: Some(*version),
        }),
        None => Error::new("Forbidden"),
    }
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<Error> {
    Error::new("Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<Error> {
    Error::new("Conflict")
}

#[catch(422)]
pub fn unprocessable(_: &Request) -> Json<Error> {
    Error::new("Request body could not be parsed")
}
