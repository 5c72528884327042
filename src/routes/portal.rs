use crate::auth::ConsentedConsumer;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::bill::BillResponse;
use crate::models::consumer::{Consumer, ConsumerAccountResponse, ConsumerResponse};
use crate::models::pagination::{PaginatedResponse, PaginationParams};
use rocket::serde::json::Json;
use rocket::{State, get};
use rocket_okapi::openapi;
use sqlx::PgPool;
use uuid::Uuid;

async fn linked_consumer(repo: &PostgresRepository, user_id: &Uuid) -> Result<Consumer, AppError> {
    repo.get_consumer_by_user_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No service account is linked to this login".to_string()))
}

/// The signed-in consumer's service account and balance
#[openapi(tag = "Consumer Portal")]
#[get("/account")]
pub async fn get_account(pool: &State<PgPool>, consumer: ConsentedConsumer) -> Result<Json<ConsumerAccountResponse>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let account = linked_consumer(&repo, &consumer.0.id).await?;
    let outstanding_balance = repo.outstanding_balance_for_consumer(&account.id).await?;

    Ok(Json(ConsumerAccountResponse {
        consumer: ConsumerResponse::from(&account),
        outstanding_balance,
    }))
}

#[openapi(tag = "Consumer Portal")]
#[get("/bills?<page>&<limit>")]
pub async fn list_my_bills(
    pool: &State<PgPool>,
    consumer: ConsentedConsumer,
    page: Option<i64>,
    limit: Option<i64>,
) -> Result<Json<PaginatedResponse<BillResponse>>, AppError> {
    let params = PaginationParams::from_query(page, limit)?;
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let account = linked_consumer(&repo, &consumer.0.id).await?;
    let (bills, total) = repo.list_bills(None, Some(&account.id), &params).await?;

    Ok(Json(PaginatedResponse::new(bills.iter().map(BillResponse::from).collect(), &params, total)))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![get_account, list_my_bills]
}

#[cfg(test)]
mod tests {
    use crate::test_utils::test_client;
    use rocket::http::Status;

    #[rocket::async_test]
    #[ignore = "requires database"]
    async fn test_portal_requires_session() {
        let client = test_client().await;
        let response = client.get("/api/v1/portal/account").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
