//! Backoff for connecting while the database is still coming up

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_parse};

/// Errors that may clear up by themselves on a later attempt
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Refused or dropped connections and pool timeouts are worth another try;
/// anything the server answered with (bad SQL, missing table) is not.
#[cfg(feature = "postgres")]
impl Transient for sea_orm::DbErr {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Conn(_) | Self::ConnectionAcquire(_))
    }
}

/// Start-up connection retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Attempts after the first one
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Wait between half and all of each scheduled delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Nominal waits before each retry, before jitter.
    pub fn schedule(&self) -> Backoff {
        Backoff {
            next: self.initial_delay.min(self.max_delay),
            max: self.max_delay,
            multiplier: self.multiplier,
            remaining: self.max_retries,
        }
    }
}

/// `DB_CONNECT_RETRIES`, `DB_CONNECT_INITIAL_DELAY_MS`, `DB_CONNECT_MAX_DELAY_MS`
#[cfg(feature = "config")]
impl FromEnv for RetryConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_retries: env_parse("DB_CONNECT_RETRIES", "5")?,
            initial_delay: Duration::from_millis(env_parse("DB_CONNECT_INITIAL_DELAY_MS", "200")?),
            max_delay: Duration::from_millis(env_parse("DB_CONNECT_MAX_DELAY_MS", "5000")?),
            ..defaults
        })
    }
}

/// Geometric delays capped at `max`, one per remaining retry
#[derive(Debug, Clone)]
pub struct Backoff {
    next: Duration,
    max: Duration,
    multiplier: f64,
    remaining: u32,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let current = self.next;
        self.next = current.mul_f64(self.multiplier).min(self.max);
        Some(current)
    }
}

/// Run `operation` until it succeeds, fails with a non-transient error,
/// or the schedule of `config` runs out. The last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut schedule = config.schedule();
    let mut attempt = 1u32;

    loop {
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Connected after retrying");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !error.is_transient() {
            warn!(attempt, error = %error, "Permanent failure, not retrying");
            return Err(error);
        }

        let Some(delay) = schedule.next() else {
            warn!(attempts = attempt, error = %error, "Retries exhausted");
            return Err(error);
        };
        let wait = if config.jitter { jitter(delay) } else { delay };

        debug!(attempt, wait_ms = wait.as_millis() as u64, error = %error, "Attempt failed, backing off");
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

/// Somewhere in [delay / 2, delay]
fn jitter(delay: Duration) -> Duration {
    use std::collections::hash_map::RandomState;
    use std::hash::BuildHasher;

    let spread = RandomState::new().hash_one(std::time::Instant::now()) % 51;
    delay.mul_f64(0.5 + spread as f64 / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq)]
    enum FakeErr {
        Refused,
        BadQuery,
    }

    impl std::fmt::Display for FakeErr {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Transient for FakeErr {
        fn is_transient(&self) -> bool {
            *self == FakeErr::Refused
        }
    }

    fn fast() -> RetryConfig {
        RetryConfig::default()
            .with_initial_delay(Duration::from_millis(2))
            .without_jitter()
    }

    #[test]
    fn test_schedule_doubles_up_to_cap() {
        let config = RetryConfig::default()
            .with_max_retries(5)
            .with_initial_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_millis(1000));

        let delays: Vec<u128> = config.schedule().map(|d| d.as_millis()).collect();
        assert_eq!(delays, vec![200, 400, 800, 1000, 1000]);
    }

    #[test]
    fn test_schedule_empty_without_retries() {
        assert_eq!(RetryConfig::default().with_max_retries(0).schedule().count(), 0);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry_with_backoff(&fast(), || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FakeErr::Refused)
                } else {
                    Ok("connected")
                }
            }
        })
        .await;

        assert_eq!(result, Ok("connected"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_when_schedule_runs_out() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry_with_backoff(&fast().with_max_retries(2), || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeErr::Refused)
            }
        })
        .await;

        assert_eq!(result, Err(FakeErr::Refused));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = retry_with_backoff(&fast(), || {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FakeErr::BadQuery)
            }
        })
        .await;

        assert_eq!(result, Err(FakeErr::BadQuery));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_jitter_stays_within_half_and_full_delay() {
        for _ in 0..20 {
            let waited = jitter(Duration::from_millis(1000)).as_millis();
            assert!((500..=1000).contains(&waited));
        }
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_connection_errors_are_transient() {
        use sea_orm::{DbErr, RuntimeErr};

        assert!(DbErr::Conn(RuntimeErr::Internal("refused".to_string())).is_transient());
        assert!(!DbErr::Custom("syntax".to_string()).is_transient());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_retry_config_from_env() {
        temp_env::with_vars(
            [
                ("DB_CONNECT_RETRIES", Some("8")),
                ("DB_CONNECT_INITIAL_DELAY_MS", Some("50")),
                ("DB_CONNECT_MAX_DELAY_MS", None),
            ],
            || {
                let config = RetryConfig::from_env().unwrap();
                assert_eq!(config.max_retries, 8);
                assert_eq!(config.initial_delay, Duration::from_millis(50));
                assert_eq!(config.max_delay, Duration::from_secs(5));
                assert!(config.jitter);
            },
        );
    }
}
