use crate::auth::StaffUser;
use crate::config::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::bill::{BillRequest, BillResponse, BillStatus};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use crate::models::payment::PaymentResponse;
use crate::service::billing::BillingService;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

/// Issue a bill from a meter reading. The previous reading defaults to the last billed reading.
#[openapi(tag = "Bills")]
#[post("/", data = "<payload>")]
pub async fn create_bill(pool: &State<PgPool>, config: &State<Config>, _staff: StaffUser, payload: Json<BillRequest>) -> Result<Created<Json<BillResponse>>, AppError> {
    payload.validate()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let bill = BillingService::new(&repo, &config.billing).create_bill(&payload).await?;

    Ok(Created::new(format!("/bills/{}", bill.id)).body(Json(BillResponse::from(&bill))))
}

#[openapi(tag = "Bills")]
#[get("/?<status>&<consumer_id>&<page>&<limit>")]
pub async fn list_bills(
    pool: &State<PgPool>,
    _staff: StaffUser,
    status: Option<BillStatus>,
    consumer_id: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<BillResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let consumer_id = consumer_id.as_deref().map(Uuid::parse_str).transpose()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let (bills, total) = repo.list_bills(status, consumer_id.as_ref(), &params).await?;

    Ok(Json(PaginatedResponse::new(bills.iter().map(BillResponse::from).collect(), &params, total)))
}

#[openapi(tag = "Bills")]
#[get("/<id>")]
pub async fn get_bill(pool: &State<PgPool>, _staff: StaffUser, id: &str) -> Result<Json<BillResponse>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let bill = repo.get_bill_by_id(&uuid).await?.ok_or_else(|| AppError::NotFound("Bill not found".to_string()))?;

    Ok(Json(BillResponse::from(&bill)))
}

#[openapi(tag = "Bills")]
#[get("/<id>/payments")]
pub async fn list_bill_payments(pool: &State<PgPool>, _staff: StaffUser, id: &str) -> Result<Json<Vec<PaymentResponse>>, AppError> {
    let uuid = Uuid::parse_str(id)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    repo.get_bill_by_id(&uuid).await?.ok_or_else(|| AppError::NotFound("Bill not found".to_string()))?;

    let payments = repo.list_payments_for_bill(&uuid).await?;
    Ok(Json(payments.iter().map(PaymentResponse::from).collect()))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![create_bill, list_bills, get_bill, list_bill_payments]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::Status;

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_bill_list_requires_staff_session() {
        let client = test_client().await;
        let response = client.get("/api/v1/bills").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
