use crate::Config;
use crate::database::postgres_repository::PostgresRepository;
use crate::db::init_pool;
use crate::error::app_error::AppError;
use crate::service::billing::BillingService;
use chrono::{NaiveDate, Utc};
use schemars::JsonSchema;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, JsonSchema)]
pub struct MarkOverdueResult {
    pub bills_marked_overdue: u64,
}

#[derive(Debug, Clone, Copy, Serialize, JsonSchema)]
pub struct PurgeExpiredResult {
    pub sessions_purged: u64,
    pub password_resets_purged: u64,
}

pub(crate) async fn mark_overdue_bills(repo: &PostgresRepository, config: &Config, today: NaiveDate) -> Result<MarkOverdueResult, AppError> {
    let bills_marked_overdue = BillingService::new(repo, &config.billing).mark_overdue(today).await?;
    tracing::info!(bills_marked_overdue, %today, "overdue bills marked");

    Ok(MarkOverdueResult { bills_marked_overdue })
}

pub(crate) async fn purge_expired_records(repo: &PostgresRepository) -> Result<PurgeExpiredResult, AppError> {
    let sessions_purged = repo.delete_expired_sessions().await?;
    let password_resets_purged = repo.delete_expired_password_resets().await?;
    tracing::info!(sessions_purged, password_resets_purged, "expired records purged");

    Ok(PurgeExpiredResult {
        sessions_purged,
        password_resets_purged,
    })
}

async fn connect(config: &Config) -> Result<PostgresRepository, String> {
    let pool = init_pool(&config.database)
        .await
        .map_err(|err| format!("Failed to initialize database pool: {err}"))?;

    Ok(PostgresRepository { pool })
}

pub async fn mark_overdue(config: &Config) -> Result<MarkOverdueResult, String> {
    let repo = connect(config).await?;
    let result = mark_overdue_bills(&repo, config, Utc::now().date_naive())
        .await
        .map_err(|err| format!("Failed to mark overdue bills: {err:?}"));

    repo.pool.close().await;
    result
}

pub async fn purge_expired(config: &Config) -> Result<PurgeExpiredResult, String> {
    let repo = connect(config).await?;
    let result = purge_expired_records(&repo)
        .await
        .map_err(|err| format!("Failed to purge expired records: {err:?}"));

    repo.pool.close().await;
    result
}
