use crate::auth::StaffUser;
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::disconnection::{DisconnectionRequest, DisconnectionResponse};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::service::billing::BillingService;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[openapi(tag = "Disconnections")]
#[post("/", data = "<payload>")]
pub async fn schedule_disconnection(
    pool: &State<PgPool>,
    config: &State<Config>,
    staff: StaffUser,
    payload: Json<DisconnectionRequest>,
) -> Result<Created<Json<DisconnectionResponse>>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let disconnection = BillingService::new(&repo, &config.billing)
        .schedule_disconnection(&payload, &staff.0.id)
        .await?;

    Ok(Created::new(format!("/disconnections/{}", disconnection.id)).body(Json(DisconnectionResponse::from(&disconnection))))
}

#[openapi(tag = "Disconnections")]
#[get("/?<consumer_id>&<page>&<limit>")]
pub async fn list_disconnections(
    pool: &State<PgPool>,
    _staff: StaffUser,
    consumer_id: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<DisconnectionResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let consumer_id = consumer_id.as_deref().map(Uuid::parse_str).transpose()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (disconnections, total) = repo.list_disconnections(consumer_id.as_ref(), &params).await?;

    Ok(Json(PaginatedResponse::new(
        disconnections.iter().map(DisconnectionResponse::from).collect(),
        &params,
        total,
    )))
}

#[openapi(tag = "Disconnections")]
#[get("/<id>")]
pub async fn get_disconnection(pool: &State<PgPool>, _staff: StaffUser, id: &str) -> Result<Json<DisconnectionResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let disconnection = repo
        .get_disconnection_by_id(&uuid)
        .await?
        .ok_or_else(|| AppError::NotFound("Disconnection not found".to_string()))?;

    Ok(Json(DisconnectionResponse::from(&disconnection)))
}

/// Mark the service as cut off. The consumer becomes `disconnected`.
#[openapi(tag = "Disconnections")]
#[post("/<id>/execute")]
pub async fn execute_disconnection(pool: &State<PgPool>, config: &State<Config>, _staff: StaffUser, id: &str) -> Result<Json<DisconnectionResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let disconnection = BillingService::new(&repo, &config.billing).execute_disconnection(&uuid).await?;

    Ok(Json(DisconnectionResponse::from(&disconnection)))
}

/// Restore service. Refused while the consumer still has an outstanding balance.
#[openapi(tag = "Disconnections")]
#[post("/<id>/reconnect")]
pub async fn reconnect(pool: &State<PgPool>, config: &State<Config>, _staff: StaffUser, id: &str) -> Result<Json<DisconnectionResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let disconnection = BillingService::new(&repo, &config.billing).reconnect(&uuid).await?;

    Ok(Json(DisconnectionResponse::from(&disconnection)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![schedule_disconnection, list_disconnections, get_disconnection, execute_disconnection, reconnect]
}
