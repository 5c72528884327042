use crate::config::SecurityConfig;
use crate::database::password_policy::PasswordPolicyRepository;
use crate::error::app_error::AppError;
use crate::models::password_policy::{CharacterClass, PasswordPolicy, PasswordRejection, PasswordVerdict};
use argon2::Argon2;
use password_hash::{PasswordHash, PasswordVerifier};
use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

static UPPERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static SYMBOL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid regex"));

/// Length and character-class checks. History is checked separately.
pub fn check_composition(candidate: &str, policy: &PasswordPolicy) -> Option<PasswordRejection> {
    if (candidate.chars().count() as i32) < policy.min_length {
        return Some(PasswordRejection::TooShort {
            min_length: policy.min_length,
        });
    }

    if policy.require_complexity {
        let missing: Vec<CharacterClass> = [
            (CharacterClass::Uppercase, &*UPPERCASE),
            (CharacterClass::Lowercase, &*LOWERCASE),
            (CharacterClass::Digit, &*DIGIT),
            (CharacterClass::Symbol, &*SYMBOL),
        ]
        .into_iter()
        .filter(|(_, pattern)| !pattern.is_match(candidate))
        .map(|(class, _)| class)
        .collect();

        if !missing.is_empty() {
            return Some(PasswordRejection::MissingCharacterClasses(missing));
        }
    }

    None
}

/// True if the candidate verifies against any of the hashes. Unparseable hashes are skipped.
pub fn matches_previous(candidate: &str, hashes: &[String]) -> bool {
    let argon2 = Argon2::default();
    hashes.iter().any(|stored| match PasswordHash::new(stored) {
        Ok(parsed) => argon2.verify_password(candidate.as_bytes(), &parsed).is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "skipping malformed password history hash");
            false
        }
    })
}

pub struct PasswordPolicyService<'a, R> {
    repository: &'a R,
    defaults: &'a SecurityConfig,
}

impl<'a, R: PasswordPolicyRepository + Sync> PasswordPolicyService<'a, R> {
    pub fn new(repository: &'a R, defaults: &'a SecurityConfig) -> Self {
        PasswordPolicyService { repository, defaults }
    }

    pub async fn policy(&self) -> Result<PasswordPolicy, AppError> {
        let policy = match self.repository.get_password_policy().await? {
            Some(policy) => policy,
            None => PasswordPolicy {
                min_length: self.defaults.default_password_min_length,
                require_complexity: self.defaults.default_require_complexity,
                password_history_count: self.defaults.default_password_history_count,
                min_password_age_days: self.defaults.default_min_password_age_days,
                max_password_age_days: self.defaults.default_max_password_age_days,
                updated_at: None,
            },
        };

        Ok(policy)
    }

    pub async fn validate_password(&self, user_id: &Uuid, candidate: &str) -> Result<PasswordVerdict, AppError> {
        let policy = self.policy().await?;

        if let Some(rejection) = check_composition(candidate, &policy) {
            return Ok(PasswordVerdict::Rejected(rejection));
        }

        let history_count = policy.history_count();
        let hashes = self.repository.recent_password_hashes(user_id, history_count as i64).await?;
        if hashes.is_empty() {
            return Ok(PasswordVerdict::Accepted);
        }

        let candidate = candidate.to_owned();
        let reused = tokio::task::spawn_blocking(move || matches_previous(&candidate, &hashes)).await?;
        if reused {
            return Ok(PasswordVerdict::Rejected(PasswordRejection::RecentlyUsed { history_count }));
        }

        Ok(PasswordVerdict::Accepted)
    }

    /// Appends the hash, then trims the user's history to the policy's retention count.
    pub async fn save_password_history(&self, user_id: &Uuid, password_hash: &str) -> Result<(), AppError> {
        let keep = self.policy().await?.history_count();

        self.repository.insert_password_history(user_id, password_hash).await?;
        let pruned = self.repository.prune_password_history(user_id, keep as i64).await?;
        if pruned > 0 {
            tracing::debug!(user_id = %user_id, pruned, "pruned password history");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::user::hash_password;
    use crate::test_utils::MockRepository;
    use proptest::prelude::*;

    fn policy(require_complexity: bool) -> PasswordPolicy {
        PasswordPolicy {
            min_length: 8,
            require_complexity,
            password_history_count: 3,
            min_password_age_days: 0,
            max_password_age_days: 90,
            updated_at: None,
        }
    }

    #[test]
    fn short_password_is_rejected() {
        assert_eq!(check_composition("Ab1!", &policy(true)), Some(PasswordRejection::TooShort { min_length: 8 }));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert_eq!(check_composition("ñññññññ", &policy(false)), Some(PasswordRejection::TooShort { min_length: 8 }));
        assert_eq!(check_composition("ññññññññ", &policy(false)), None);
    }

    #[test]
    fn complexity_reports_every_missing_class() {
        assert_eq!(
            check_composition("alllowercase", &policy(true)),
            Some(PasswordRejection::MissingCharacterClasses(vec![
                CharacterClass::Uppercase,
                CharacterClass::Digit,
                CharacterClass::Symbol,
            ]))
        );
        assert_eq!(check_composition("Valve#2026", &policy(true)), None);
    }

    #[test]
    fn complexity_is_optional() {
        assert_eq!(check_composition("alllowercase", &policy(false)), None);
    }

    #[test]
    fn malformed_history_hashes_are_skipped() {
        let good = hash_password("Hydrant#77").unwrap();
        let hashes = vec!["not-a-phc-string".to_string(), good];

        assert!(matches_previous("Hydrant#77", &hashes));
        assert!(!matches_previous("Hydrant#78", &hashes[..1]));
    }

    #[tokio::test]
    async fn reused_password_is_rejected() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_password_policy(policy(true));
        let defaults = SecurityConfig::default();
        let service = PasswordPolicyService::new(&repo, &defaults);

        service.save_password_history(&user_id, &hash_password("Pipeline#1").unwrap()).await.unwrap();

        let verdict = service.validate_password(&user_id, "Pipeline#1").await.unwrap();
        assert_eq!(verdict, PasswordVerdict::Rejected(PasswordRejection::RecentlyUsed { history_count: 3 }));

        let verdict = service.validate_password(&user_id, "Pipeline#2").await.unwrap();
        assert!(verdict.is_accepted());
    }

    #[tokio::test]
    async fn history_older_than_retention_may_be_reused() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_password_policy(policy(true));
        let defaults = SecurityConfig::default();
        let service = PasswordPolicyService::new(&repo, &defaults);

        for password in ["Meter#0001", "Meter#0002", "Meter#0003", "Meter#0004"] {
            service.save_password_history(&user_id, &hash_password(password).unwrap()).await.unwrap();
        }

        assert!(service.validate_password(&user_id, "Meter#0001").await.unwrap().is_accepted());
        assert!(!service.validate_password(&user_id, "Meter#0002").await.unwrap().is_accepted());
    }

    #[tokio::test]
    async fn zero_history_count_falls_back_to_five() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_password_policy(PasswordPolicy {
            password_history_count: 0,
            ..policy(false)
        });
        let defaults = SecurityConfig::default();
        let service = PasswordPolicyService::new(&repo, &defaults);

        for i in 0..8 {
            service.save_password_history(&user_id, &format!("hash-{i}")).await.unwrap();
        }
        assert_eq!(repo.password_history(&user_id).await.len(), 5);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn history_keeps_the_newest_min_m_k(saves in 0usize..15, keep in 1i32..8) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let remaining = runtime.block_on(async {
                let user_id = Uuid::new_v4();
                let repo = MockRepository::default().with_password_policy(PasswordPolicy {
                    password_history_count: keep,
                    ..policy(false)
                });
                let defaults = SecurityConfig::default();
                let service = PasswordPolicyService::new(&repo, &defaults);

                for i in 0..saves {
                    service.save_password_history(&user_id, &format!("hash-{i}")).await.unwrap();
                }
                repo.password_history(&user_id).await
            });

            let expected: Vec<String> = (0..saves).rev().take(keep as usize).map(|i| format!("hash-{i}")).collect();
            prop_assert_eq!(remaining.len(), saves.min(keep as usize));
            prop_assert_eq!(remaining, expected);
        }
    }
}
