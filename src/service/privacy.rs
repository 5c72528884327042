use crate::database::audit::{AuditContext, AuditRepository, record_audit_event_best_effort};
use crate::database::privacy::PrivacyRepository;
use crate::error::app_error::AppError;
use crate::models::audit::{AuditEvent, audit_events};
use crate::models::privacy::PrivacyStatusResponse;
use uuid::Uuid;

/// A user must (re)consent when a policy is published and they have not agreed to it or a later one.
pub fn requires_consent(agreed_version: Option<i32>, published_version: Option<i32>) -> bool {
    match (agreed_version, published_version) {
        (_, None) => false,
        (None, Some(_)) => true,
        (Some(agreed), Some(published)) => agreed < published,
    }
}

/// Consent is only accepted for the currently published version.
pub fn validate_consent_version(requested: i32, published_version: Option<i32>) -> Result<i32, AppError> {
    match published_version {
        None => Err(AppError::NotFound("No privacy policy has been published".to_string())),
        Some(published) if published == requested => Ok(published),
        Some(published) => Err(AppError::BadRequest(format!(
            "consent must be given to the published version {}",
            published
        ))),
    }
}

pub struct PrivacyService<'a, R> {
    repository: &'a R,
}

impl<'a, R: PrivacyRepository + AuditRepository + Sync> PrivacyService<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        PrivacyService { repository }
    }

    pub async fn status(&self, user_id: &Uuid) -> Result<PrivacyStatusResponse, AppError> {
        let published_version = self.repository.get_published_privacy_version().await?;
        let (agreed_version, agreed_at) = self.repository.get_privacy_agreement(user_id).await?;

        Ok(PrivacyStatusResponse {
            published_version,
            agreed_version,
            agreed_at,
            consent_required: requires_consent(agreed_version, published_version),
        })
    }

    /// Returns the published version the user still has to agree to, if any.
    pub async fn pending_version(&self, user_id: &Uuid) -> Result<Option<i32>, AppError> {
        let published_version = self.repository.get_published_privacy_version().await?;
        let (agreed_version, _) = self.repository.get_privacy_agreement(user_id).await?;

        Ok(published_version.filter(|_| requires_consent(agreed_version, published_version)))
    }

    pub async fn consent(&self, user_id: &Uuid, version: i32, context: &AuditContext) -> Result<PrivacyStatusResponse, AppError> {
        let published_version = self.repository.get_published_privacy_version().await?;
        let version = validate_consent_version(version, published_version)?;

        let agreed_at = self.repository.record_privacy_consent(user_id, version).await?;
        let event = AuditEvent::new(Some(user_id), audit_events::PRIVACY_CONSENT_GIVEN, true).with_metadata(Some(serde_json::json!({ "version": version })));
        record_audit_event_best_effort(self.repository, &event, context).await;

        Ok(PrivacyStatusResponse {
            published_version,
            agreed_version: Some(version),
            agreed_at: Some(agreed_at),
            consent_required: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRepository;

    #[test]
    fn no_published_policy_never_requires_consent() {
        assert!(!requires_consent(None, None));
        assert!(!requires_consent(Some(3), None));
    }

    #[test]
    fn newer_policy_requires_consent() {
        assert!(requires_consent(None, Some(1)));
        assert!(requires_consent(Some(1), Some(2)));
        assert!(!requires_consent(Some(2), Some(2)));
        assert!(!requires_consent(Some(3), Some(2)));
    }

    #[test]
    fn consent_must_target_published_version() {
        assert_eq!(validate_consent_version(2, Some(2)).unwrap(), 2);
        assert!(matches!(validate_consent_version(1, Some(2)), Err(AppError::BadRequest(_))));
        assert!(matches!(validate_consent_version(1, None), Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn consent_is_recorded_and_audited() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_published_privacy_version(2);

        let status = PrivacyService::new(&repo).consent(&user_id, 2, &AuditContext::default()).await.unwrap();

        assert_eq!(status.agreed_version, Some(2));
        assert!(!status.consent_required);
        assert_eq!(repo.audit_event_types().await, vec![audit_events::PRIVACY_CONSENT_GIVEN.to_string()]);
    }

    #[tokio::test]
    async fn consent_succeeds_when_audit_write_fails() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_published_privacy_version(2).with_failing_audit_log();
        let service = PrivacyService::new(&repo);

        let status = service.consent(&user_id, 2, &AuditContext::default()).await.unwrap();

        assert_eq!(status.agreed_version, Some(2));
        assert!(repo.audit_event_types().await.is_empty());
        assert!(!service.status(&user_id).await.unwrap().consent_required);
    }

    #[tokio::test]
    async fn consent_to_stale_version_is_rejected() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_published_privacy_version(3);

        let result = PrivacyService::new(&repo).consent(&user_id, 2, &AuditContext::default()).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(PrivacyService::new(&repo).pending_version(&user_id).await.unwrap(), Some(3));
    }
}
