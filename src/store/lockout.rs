//! Failed-attempt lockout policy applied by the store adapters.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 5;
const DEFAULT_LOCKOUT_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockoutPolicy {
    max_failed_attempts: u32,
    lockout_duration: Duration,
}

impl LockoutPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            lockout_duration: DEFAULT_LOCKOUT_DURATION,
        }
    }

    /// Zero is treated as one: every failure locks.
    #[must_use]
    pub fn with_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.max_failed_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    #[must_use]
    pub fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    #[must_use]
    pub fn lockout_duration(&self) -> Duration {
        self.lockout_duration
    }

    /// Whether `failed_attempts` consecutive failures trigger a lockout.
    #[must_use]
    pub fn should_lock(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_failed_attempts
    }

    /// End of a lockout that starts at `now`.
    #[must_use]
    pub fn lockout_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let delta = TimeDelta::from_std(self.lockout_duration).unwrap_or(TimeDelta::MAX);
        now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let policy = LockoutPolicy::new();
        assert_eq!(policy.max_failed_attempts(), DEFAULT_MAX_FAILED_ATTEMPTS);
        assert_eq!(policy.lockout_duration(), DEFAULT_LOCKOUT_DURATION);

        let policy = policy
            .with_max_failed_attempts(3)
            .with_lockout_duration(Duration::from_secs(60));
        assert_eq!(policy.max_failed_attempts(), 3);
        assert_eq!(policy.lockout_duration(), Duration::from_secs(60));
    }

    #[test]
    fn zero_attempts_locks_on_first_failure() {
        let policy = LockoutPolicy::new().with_max_failed_attempts(0);
        assert!(policy.should_lock(1));
        assert!(!policy.should_lock(0));
    }

    #[test]
    fn lockout_end_adds_duration() {
        let now = Utc::now();
        let policy = LockoutPolicy::new().with_lockout_duration(Duration::from_secs(90));
        assert_eq!((policy.lockout_end(now) - now).num_seconds(), 90);
    }

    #[test]
    fn huge_duration_saturates() {
        let policy = LockoutPolicy::new().with_lockout_duration(Duration::MAX);
        assert_eq!(policy.lockout_end(Utc::now()), DateTime::<Utc>::MAX_UTC);
    }
}
