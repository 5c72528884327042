use crate::auth::StaffUser;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::consumer::{ConsumerAccountResponse, ConsumerRequest, ConsumerResponse};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, get, post, put};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

#[openapi(tag = "Consumers")]
#[post("/", data = "<payload>")]
pub async fn create_consumer(pool: &State<PgPool>, _staff: StaffUser, payload: Json<ConsumerRequest>) -> Result<Created<Json<ConsumerResponse>>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let consumer = repo.create_consumer(&payload).await?;

    Ok(Created::new(format!("/consumers/{}", consumer.id)).body(Json(ConsumerResponse::from(&consumer))))
}

/// List consumers, optionally filtered by account number, meter number or name
#[openapi(tag = "Consumers")]
#[get("/?<page>&<limit>&<search>")]
pub async fn list_consumers(
    pool: &State<PgPool>,
    _staff: StaffUser,
    page: Option<i64>,
    limit: Option<i64>,
    search: Option<String>,
) -> Result<Json<PaginatedResponse<ConsumerResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let search = search.as_deref().filter(|s| !s.trim().is_empty());

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (consumers, total) = repo.list_consumers(&params, search).await?;

    Ok(Json(PaginatedResponse::new(consumers.iter().map(ConsumerResponse::from).collect(), &params, total)))
}

#[openapi(tag = "Consumers")]
#[get("/<id>")]
pub async fn get_consumer(pool: &State<PgPool>, _staff: StaffUser, id: &str) -> Result<Json<ConsumerAccountResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };

    let consumer = repo
        .get_consumer_by_id(&uuid)
        .await?
        .ok_or_else(|| AppError::NotFound("Consumer not found".to_string()))?;
    let outstanding_balance = repo.outstanding_balance_for_consumer(&consumer.id).await?;

    Ok(Json(ConsumerAccountResponse {
        consumer: ConsumerResponse::from(&consumer),
        outstanding_balance,
    }))
}

#[openapi(tag = "Consumers")]
#[put("/<id>", data = "<payload>")]
pub async fn put_consumer(pool: &State<PgPool>, _staff: StaffUser, id: &str, payload: Json<ConsumerRequest>) -> Result<Json<ConsumerResponse>, AppError> {
    payload.validate()?;

    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let consumer = repo.update_consumer(&uuid, &payload).await?;

    Ok(Json(ConsumerResponse::from(&consumer)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_consumer, list_consumers, get_consumer, put_consumer]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::Status;

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_consumer_list_requires_staff_session() {
        let client = test_client().await;
        let response = client.get("/api/v1/consumers").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
