//! Lock configuration and its validated form.

use std::time::Duration;

use rand::Rng;

use crate::error::{LockError, LockResult};

/// Smallest lease a lock may be configured with.
pub const MIN_LOCK_EXPIRE: Duration = Duration::from_millis(300);

/// Largest lease a lock may be configured with, the most a store can take
/// as a signed millisecond TTL.
pub const MAX_LOCK_EXPIRE: Duration = Duration::from_millis(i64::MAX as u64);

/// Lease used when the caller leaves `expire` unset.
pub const DEFAULT_LOCK_EXPIRE: Duration = Duration::from_millis(3000);

/// Retry count used when auto-retry is enabled without an explicit count.
pub const DEFAULT_RETRY_TIMES: u32 = 3;

/// Default lower bound of the pause between acquisition attempts.
pub const DEFAULT_RETRY_DELAY_MIN: Duration = Duration::from_millis(20);

/// Default upper bound of the pause between acquisition attempts.
pub const DEFAULT_RETRY_DELAY_MAX: Duration = Duration::from_millis(100);

/// Raw locking parameters as supplied by the caller.
///
/// Zero values mean "unset" and are replaced by defaults in
/// [`LockConfig::validate`].
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use leased_lock_core::config::LockConfig;
///
/// let options = LockConfig::new()
///     .expire(Duration::from_secs(5))
///     .auto_retry(true)
///     .auto_refresh(true)
///     .validate()
///     .unwrap();
///
/// assert_eq!(options.retries(), 3);
/// assert_eq!(options.refresh_interval(), Some(Duration::from_millis(3333)));
/// ```
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease duration. `Duration::ZERO` selects [`DEFAULT_LOCK_EXPIRE`].
    pub expire: Duration,
    /// Keep trying until the lock is acquired (or the wait is cancelled).
    pub block: bool,
    /// Retry a failed attempt up to `retries` times.
    pub auto_retry: bool,
    /// Number of retries for `auto_retry`. Zero selects [`DEFAULT_RETRY_TIMES`].
    pub retries: u32,
    /// Extend the lease in the background while held.
    pub auto_refresh: bool,
    /// Lower bound of the jittered pause between attempts.
    pub retry_delay_min: Duration,
    /// Upper bound of the jittered pause between attempts.
    pub retry_delay_max: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expire: Duration::ZERO,
            block: false,
            auto_retry: false,
            retries: 0,
            auto_refresh: false,
            retry_delay_min: DEFAULT_RETRY_DELAY_MIN,
            retry_delay_max: DEFAULT_RETRY_DELAY_MAX,
        }
    }
}

impl LockConfig {
    /// Creates a configuration with every option unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the lease duration.
    pub fn expire(mut self, expire: Duration) -> Self {
        self.expire = expire;
        self
    }

    /// Makes acquisition wait until the lock becomes free.
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }

    /// Enables bounded retries of a failed attempt.
    pub fn auto_retry(mut self, auto_retry: bool) -> Self {
        self.auto_retry = auto_retry;
        self
    }

    /// Sets the number of retries used by `auto_retry`.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Enables background lease extension.
    pub fn auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    /// Sets the range the pause between attempts is drawn from.
    pub fn retry_delay(mut self, min: Duration, max: Duration) -> Self {
        self.retry_delay_min = min;
        self.retry_delay_max = max;
        self
    }

    /// Validates and normalises the configuration.
    ///
    /// # Errors
    ///
    /// * `LockError::ExpireTooSmall` - a non-zero `expire` below [`MIN_LOCK_EXPIRE`]
    /// * `LockError::ExpireTooLarge` - `expire` above [`MAX_LOCK_EXPIRE`]
    pub fn validate(&self) -> LockResult<LockOptions> {
        let expire = if self.expire.is_zero() {
            DEFAULT_LOCK_EXPIRE
        } else {
            self.expire
        };
        if expire < MIN_LOCK_EXPIRE {
            return Err(LockError::ExpireTooSmall {
                expire,
                min: MIN_LOCK_EXPIRE,
            });
        }
        if expire > MAX_LOCK_EXPIRE {
            return Err(LockError::ExpireTooLarge {
                expire,
                max: MAX_LOCK_EXPIRE,
            });
        }

        let retries = if self.auto_retry && self.retries == 0 {
            DEFAULT_RETRY_TIMES
        } else {
            self.retries
        };

        // Renew with a third of the lease left, so one missed cycle is survivable.
        let refresh_interval = self
            .auto_refresh
            .then(|| Duration::from_millis((expire.as_millis() * 2 / 3) as u64));

        let retry_delay_max = self.retry_delay_max.max(self.retry_delay_min);

        Ok(LockOptions {
            expire,
            block: self.block,
            auto_retry: self.auto_retry,
            retries,
            refresh_interval,
            retry_delay_min: self.retry_delay_min,
            retry_delay_max,
        })
    }
}

/// Validated, immutable locking parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    expire: Duration,
    block: bool,
    auto_retry: bool,
    retries: u32,
    refresh_interval: Option<Duration>,
    retry_delay_min: Duration,
    retry_delay_max: Duration,
}

impl LockOptions {
    pub fn expire(&self) -> Duration {
        self.expire
    }

    pub fn block(&self) -> bool {
        self.block
    }

    pub fn auto_retry(&self) -> bool {
        self.auto_retry
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn auto_refresh(&self) -> bool {
        self.refresh_interval.is_some()
    }

    /// Period of the refresh watchdog, present only with auto-refresh.
    pub fn refresh_interval(&self) -> Option<Duration> {
        self.refresh_interval
    }

    /// Total number of acquisition attempts, `None` when unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        if self.block {
            None
        } else if self.auto_retry {
            Some(self.retries.saturating_add(1))
        } else {
            Some(1)
        }
    }

    /// Draws a jittered pause to sleep between two attempts.
    pub fn retry_delay(&self) -> Duration {
        if self.retry_delay_min == self.retry_delay_max {
            return self.retry_delay_min;
        }
        rand::thread_rng().gen_range(self.retry_delay_min..=self.retry_delay_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_expire_uses_default() {
        let options = LockConfig::new().validate().unwrap();
        assert_eq!(options.expire(), DEFAULT_LOCK_EXPIRE);
        assert!(!options.auto_refresh());
        assert_eq!(options.refresh_interval(), None);
    }

    #[test]
    fn test_expire_below_floor_is_rejected() {
        for millis in [1, 100, 299] {
            let err = LockConfig::new()
                .expire(Duration::from_millis(millis))
                .validate()
                .unwrap_err();
            assert!(matches!(err, LockError::ExpireTooSmall { .. }), "{millis}ms");
        }
    }

    #[test]
    fn test_expire_at_floor_is_accepted() {
        let options = LockConfig::new().expire(MIN_LOCK_EXPIRE).validate().unwrap();
        assert_eq!(options.expire(), MIN_LOCK_EXPIRE);
    }

    #[test]
    fn test_expire_above_ceiling_is_rejected() {
        let err = LockConfig::new().expire(Duration::MAX).validate().unwrap_err();
        assert!(matches!(err, LockError::ExpireTooLarge { .. }));

        let err = LockConfig::new()
            .expire(MAX_LOCK_EXPIRE + Duration::from_millis(1))
            .validate()
            .unwrap_err();
        assert!(matches!(err, LockError::ExpireTooLarge { .. }));

        let options = LockConfig::new().expire(MAX_LOCK_EXPIRE).validate().unwrap();
        assert_eq!(options.expire().as_millis(), i64::MAX as u128);
    }

    #[test]
    fn test_auto_retry_defaults_retries() {
        let options = LockConfig::new().auto_retry(true).validate().unwrap();
        assert_eq!(options.retries(), DEFAULT_RETRY_TIMES);
        assert_eq!(options.max_attempts(), Some(DEFAULT_RETRY_TIMES + 1));

        let options = LockConfig::new().auto_retry(true).retries(7).validate().unwrap();
        assert_eq!(options.retries(), 7);
    }

    #[test]
    fn test_refresh_interval_is_two_thirds_of_expire() {
        let options = LockConfig::new()
            .expire(Duration::from_millis(300))
            .auto_refresh(true)
            .validate()
            .unwrap();
        assert_eq!(options.refresh_interval(), Some(Duration::from_millis(200)));

        let options = LockConfig::new().auto_refresh(true).validate().unwrap();
        let interval = options.refresh_interval().unwrap();
        assert_eq!(interval, Duration::from_millis(2000));
        assert!(interval < options.expire());
    }

    #[test]
    fn test_max_attempts_by_mode() {
        assert_eq!(LockConfig::new().validate().unwrap().max_attempts(), Some(1));
        let blocking = LockConfig::new().block(true).auto_retry(true).validate().unwrap();
        assert_eq!(blocking.max_attempts(), None);
    }

    #[test]
    fn test_retry_delay_stays_in_range() {
        let options = LockConfig::new()
            .retry_delay(Duration::from_millis(5), Duration::from_millis(15))
            .validate()
            .unwrap();
        for _ in 0..100 {
            let delay = options.retry_delay();
            assert!(delay >= Duration::from_millis(5) && delay <= Duration::from_millis(15));
        }

        // An inverted range collapses onto its lower bound.
        let options = LockConfig::new()
            .retry_delay(Duration::from_millis(50), Duration::from_millis(10))
            .validate()
            .unwrap();
        assert_eq!(options.retry_delay(), Duration::from_millis(50));
    }
}
