use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::models::audit::{AuditEvent, SecurityAuditEntry};
use crate::models::pagination::PaginationParams;
use uuid::Uuid;

/// Request origin attached to audit entries.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

fn trace_audit_event(event: &AuditEvent<'_>, context: &AuditContext) {
    let user_id = event.user_id.map(Uuid::to_string).unwrap_or_else(|| "-".to_string());
    let ip = context.ip_address.as_deref().unwrap_or("-");

    if event.success {
        tracing::info!(category = "audit", event_type = event.event_type, user_id = %user_id, ip, "security audit event");
    } else {
        tracing::warn!(category = "audit", event_type = event.event_type, user_id = %user_id, ip, metadata = ?event.metadata, "security audit event (failure)");
    }
}

#[async_trait::async_trait]
pub trait AuditRepository {
    async fn record_audit_event(&self, event: &AuditEvent<'_>, context: &AuditContext) -> Result<(), AppError>;
}

/// Writes the event, logging instead of failing when the sink rejects it.
pub async fn record_audit_event_best_effort<R: AuditRepository + Sync>(repository: &R, event: &AuditEvent<'_>, context: &AuditContext) {
    if let Err(e) = repository.record_audit_event(event, context).await {
        tracing::error!(error = ?e, event_type = event.event_type, "failed to write security audit log");
    }
}

#[async_trait::async_trait]
impl AuditRepository for PostgresRepository {
    /// Persists a security event. The event is traced before the insert so it survives a database failure.
    async fn record_audit_event(&self, event: &AuditEvent<'_>, context: &AuditContext) -> Result<(), AppError> {
        trace_audit_event(event, context);

        sqlx::query(
            r#"
            INSERT INTO security_audit_log (user_id, event_type, success, ip_address, user_agent, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(event.user_id)
        .bind(event.event_type)
        .bind(event.success)
        .bind(context.ip_address.as_deref())
        .bind(context.user_agent.as_deref())
        .bind(event.metadata.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

impl PostgresRepository {
    /// Newest first, optionally narrowed to one user.
    pub async fn list_security_audit_log(&self, user_id: Option<&Uuid>, params: &PaginationParams) -> Result<(Vec<SecurityAuditEntry>, i64), AppError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM security_audit_log WHERE ($1::uuid IS NULL OR user_id = $1)")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let entries = sqlx::query_as::<_, SecurityAuditEntry>(
            r#"
            SELECT id, user_id, event_type, success, ip_address, user_agent, metadata, created_at
            FROM security_audit_log
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(params.limit)
        .bind(params.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((entries, total))
    }
}
