use crate::config::SecurityConfig;
use crate::database::lockout::LockoutRepository;
use crate::error::app_error::AppError;
use crate::models::lockout::{FailedLoginOutcome, LockoutSettings, LockoutState};
use chrono::{DateTime, Duration, Utc};

/// Locked iff a lockout end is set and still in the future.
pub fn is_locked(state: &LockoutState, now: DateTime<Utc>) -> bool {
    state.lockout_end.is_some_and(|end| end > now)
}

pub fn lockout_message(until: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (until - now).num_seconds().max(0);
    let minutes = ((seconds + 59) / 60).max(1);
    let unit = if minutes == 1 { "minute" } else { "minutes" };
    format!("Account locked due to too many failed login attempts. Try again in {} {}.", minutes, unit)
}

/// Counts one failure against `state`. Reaching the threshold starts a lock
/// and restarts the counter, so every lock period needs a fresh run of failures.
pub fn register_failure(state: &mut LockoutState, settings: LockoutSettings, now: DateTime<Utc>) -> FailedLoginOutcome {
    if state.lockout_end.is_some_and(|end| end <= now) {
        state.lockout_end = None;
        state.is_locked = false;
    }

    state.failed_access_count += 1;

    if state.failed_access_count >= settings.max_failed_access_attempts.max(1) {
        let until = now + Duration::minutes(settings.lockout_duration_minutes.max(1) as i64);
        state.failed_access_count = 0;
        state.lockout_end = Some(until);
        state.is_locked = true;

        return FailedLoginOutcome::Locked {
            until,
            message: lockout_message(until, now),
        };
    }

    FailedLoginOutcome::InvalidCredentials
}

pub fn clear_lockout(state: &mut LockoutState) {
    state.failed_access_count = 0;
    state.lockout_end = None;
    state.is_locked = false;
}

pub struct LockoutService<'a, R> {
    repository: &'a R,
    defaults: &'a SecurityConfig,
}

impl<'a, R: LockoutRepository + Sync> LockoutService<'a, R> {
    pub fn new(repository: &'a R, defaults: &'a SecurityConfig) -> Self {
        LockoutService { repository, defaults }
    }

    /// Stored policy, or the configured fallbacks when none has been saved.
    pub async fn get_policy(&self) -> Result<LockoutSettings, AppError> {
        let settings = match self.repository.get_lockout_policy().await? {
            Some(policy) => LockoutSettings::from(&policy),
            None => LockoutSettings {
                max_failed_access_attempts: self.defaults.default_max_failed_attempts,
                lockout_duration_minutes: self.defaults.default_lockout_minutes,
            },
        };

        Ok(settings)
    }

    /// The updated state is persisted whether or not the threshold was reached.
    pub async fn record_failed_attempt(&self, state: &mut LockoutState) -> Result<FailedLoginOutcome, AppError> {
        let settings = self.get_policy().await?;
        let outcome = register_failure(state, settings, Utc::now());
        self.repository.save_lockout_state(state).await?;

        if let FailedLoginOutcome::Locked { until, .. } = &outcome {
            tracing::warn!(user_id = %state.user_id, lockout_end = %until, "account locked after repeated failed logins");
        }

        Ok(outcome)
    }

    pub async fn reset_lockout(&self, state: &mut LockoutState) -> Result<(), AppError> {
        clear_lockout(state);
        self.repository.save_lockout_state(state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRepository;
    use proptest::prelude::*;
    use uuid::Uuid;

    fn settings(max: i32) -> LockoutSettings {
        LockoutSettings {
            max_failed_access_attempts: max,
            lockout_duration_minutes: 15,
        }
    }

    #[test]
    fn null_lockout_end_is_not_locked() {
        assert!(!is_locked(&LockoutState::new(Uuid::new_v4()), Utc::now()));
    }

    #[test]
    fn elapsed_lockout_is_not_locked_without_reset() {
        let now = Utc::now();
        let mut state = LockoutState::new(Uuid::new_v4());
        state.lockout_end = Some(now - Duration::seconds(1));
        state.is_locked = true;

        assert!(!is_locked(&state, now));
        assert!(is_locked(&state, now - Duration::minutes(5)));
    }

    #[test]
    fn lock_restarts_the_counter() {
        let now = Utc::now();
        let mut state = LockoutState::new(Uuid::new_v4());
        state.failed_access_count = 2;

        let outcome = register_failure(&mut state, settings(3), now);
        assert!(matches!(outcome, FailedLoginOutcome::Locked { .. }));
        assert_eq!(state.failed_access_count, 0);
        assert_eq!(state.lockout_end, Some(now + Duration::minutes(15)));
        assert!(state.is_locked);
    }

    #[test]
    fn lockout_message_rounds_up_to_minutes() {
        let now = Utc::now();
        assert_eq!(
            lockout_message(now + Duration::seconds(61), now),
            "Account locked due to too many failed login attempts. Try again in 2 minutes."
        );
        assert_eq!(
            lockout_message(now + Duration::seconds(5), now),
            "Account locked due to too many failed login attempts. Try again in 1 minute."
        );
    }

    #[test]
    fn clear_lockout_resets_everything() {
        let mut state = LockoutState {
            user_id: Uuid::new_v4(),
            failed_access_count: 4,
            lockout_end: Some(Utc::now()),
            is_locked: true,
        };
        clear_lockout(&mut state);
        assert_eq!(state, LockoutState::new(state.user_id));
    }

    proptest! {
        #[test]
        fn locks_exactly_on_the_nth_failure(max in 1i32..20) {
            let now = Utc::now();
            let mut state = LockoutState::new(Uuid::new_v4());

            for attempt in 1..max {
                let outcome = register_failure(&mut state, settings(max), now);
                prop_assert_eq!(outcome, FailedLoginOutcome::InvalidCredentials);
                prop_assert!(!is_locked(&state, now));
                prop_assert_eq!(state.failed_access_count, attempt);
            }

            let outcome = register_failure(&mut state, settings(max), now);
            let is_locked_outcome = matches!(outcome, FailedLoginOutcome::Locked { .. });
            prop_assert!(is_locked_outcome);
            prop_assert!(is_locked(&state, now));
        }
    }

    #[tokio::test]
    async fn get_policy_falls_back_to_configured_defaults() {
        let repo = MockRepository::default();
        let defaults = SecurityConfig::default();
        let service = LockoutService::new(&repo, &defaults);

        let policy = service.get_policy().await.unwrap();
        assert_eq!(policy, settings(5));
    }

    #[tokio::test]
    async fn failed_attempts_are_persisted_every_time() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default().with_lockout_policy(2, 30);
        let defaults = SecurityConfig::default();
        let service = LockoutService::new(&repo, &defaults);
        let mut state = LockoutState::new(user_id);

        let first = service.record_failed_attempt(&mut state).await.unwrap();
        assert_eq!(first, FailedLoginOutcome::InvalidCredentials);
        assert_eq!(repo.saved_lockout_state(&user_id).await.map(|s| s.failed_access_count), Some(1));

        let second = service.record_failed_attempt(&mut state).await.unwrap();
        assert!(matches!(second, FailedLoginOutcome::Locked { .. }));
        let saved = repo.saved_lockout_state(&user_id).await.unwrap();
        assert!(saved.lockout_end.is_some());
        assert_eq!(saved.failed_access_count, 0);
    }

    #[tokio::test]
    async fn reset_lockout_persists_cleared_state() {
        let user_id = Uuid::new_v4();
        let repo = MockRepository::default();
        let defaults = SecurityConfig::default();
        let service = LockoutService::new(&repo, &defaults);
        let mut state = LockoutState {
            user_id,
            failed_access_count: 3,
            lockout_end: Some(Utc::now() + Duration::minutes(10)),
            is_locked: true,
        };

        service.reset_lockout(&mut state).await.unwrap();
        assert_eq!(repo.saved_lockout_state(&user_id).await, Some(LockoutState::new(user_id)));
    }
}
