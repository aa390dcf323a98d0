use std::{
    fmt::{self, Debug},
    time::Duration,
};
use tokio::time::Instant;

use crate::ThrottleError;

pub(crate) mod coordinator;
pub mod window;

/// How long a saturated window waits before it is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize, serde::Serialize),
    serde(rename_all = "snake_case")
)]
pub enum ResetDelay {
    /// Always wait one whole `interval`, counted from the moment the reset
    /// was triggered.
    ///
    /// Effective windows may therefore be longer than `interval`, and a call
    /// arriving after an idle, already expired window still waits a full
    /// `interval` before it runs.
    #[default]
    FullInterval,
    /// Wait only until the current window expires on its own.
    ///
    /// A call arriving after an expired window resets it at once.
    Remaining,
}

/// Limiting policy: at most `limit` calls begin within each `interval` window.
///
/// A policy is always valid: both `interval` and `limit` are non-zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(try_from = "PolicyConfig")
)]
pub struct ThrottlePolicy {
    interval: Duration,
    limit: u32,
    reset_delay: ResetDelay,
}

impl ThrottlePolicy {
    /// Create a policy with the default [`ResetDelay`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use throttle_window::{ThrottleError, ThrottlePolicy};
    ///
    /// assert!(ThrottlePolicy::new(Duration::from_millis(100), 2).is_ok());
    /// assert_eq!(
    ///     ThrottlePolicy::new(Duration::from_millis(100), 0),
    ///     Err(ThrottleError::ZeroLimit),
    /// );
    /// ```
    pub fn new(interval: Duration, limit: u32) -> Result<Self, ThrottleError> {
        Self::builder().interval(interval).limit(limit).build()
    }

    /// Initialize a builder to create policy.
    pub fn builder() -> ThrottlePolicyBuilder {
        ThrottlePolicyBuilder::new()
    }

    /// Window length.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Maximum admitted calls per window.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// How long a saturated window waits before it is reset.
    pub fn reset_delay(&self) -> ResetDelay {
        self.reset_delay
    }

    /// How long a reset triggered at `now` should wait.
    pub(crate) fn delay_before_reset(&self, window_start: Instant, now: Instant) -> Duration {
        match self.reset_delay {
            ResetDelay::FullInterval => self.interval,
            ResetDelay::Remaining => match window_start.checked_add(self.interval) {
                Some(window_end) => window_end.saturating_duration_since(now),
                // window ends beyond what `Instant` can express
                None => self.interval,
            },
        }
    }
}

/// Deadlines past this distance are clamped to it.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// `base + delay`, clamped to [`FAR_FUTURE`] instead of overflowing.
pub(crate) fn deadline_after(base: Instant, delay: Duration) -> Instant {
    base.checked_add(delay.min(FAR_FUTURE)).unwrap_or(base)
}

impl Debug for ThrottlePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottlePolicy")
            .field("interval", &self.interval)
            .field("limit", &self.limit)
            .field("reset_delay", &self.reset_delay)
            .finish()
    }
}

/// Use to build a [`ThrottlePolicy`].
///
/// Created by [`ThrottlePolicy::builder()`] API.
#[derive(Debug, Clone)]
pub struct ThrottlePolicyBuilder {
    interval: Duration,
    limit: u32,
    reset_delay: ResetDelay,
}

impl ThrottlePolicyBuilder {
    fn new() -> Self {
        Self {
            interval: Duration::default(),
            limit: 1,
            reset_delay: ResetDelay::default(),
        }
    }

    /// Set interval, no default value: it must be set to something non-zero.
    pub fn interval(&mut self, interval: Duration) -> &mut Self {
        self.interval = interval;
        self
    }

    /// Set limit, default value is `1`.
    pub fn limit(&mut self, limit: u32) -> &mut Self {
        self.limit = limit;
        self
    }

    /// Set reset delay, default value is [`ResetDelay::FullInterval`].
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use throttle_window::{ResetDelay, ThrottlePolicy};
    ///
    /// let policy = ThrottlePolicy::builder()
    ///     .interval(Duration::from_secs(1))
    ///     .limit(10)
    ///     .reset_delay(ResetDelay::Remaining)
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(policy.reset_delay(), ResetDelay::Remaining);
    /// ```
    pub fn reset_delay(&mut self, reset_delay: ResetDelay) -> &mut Self {
        self.reset_delay = reset_delay;
        self
    }

    /// Create a new [`ThrottlePolicy`] with current configuration.
    ///
    /// Return an error if `interval` or `limit` is zero.
    pub fn build(&self) -> Result<ThrottlePolicy, ThrottleError> {
        if self.interval.is_zero() {
            return Err(ThrottleError::ZeroInterval);
        }

        if self.limit == 0 {
            return Err(ThrottleError::ZeroLimit);
        }

        Ok(ThrottlePolicy {
            interval: self.interval,
            limit: self.limit,
            reset_delay: self.reset_delay,
        })
    }
}

/// Serialized shape of a [`ThrottlePolicy`].
///
/// The interval is given in exactly one unit. Serializing picks the coarsest
/// unit which holds the interval exactly.
#[cfg(feature = "serde")]
#[derive(Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
struct PolicyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_us: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    interval_ns: Option<u64>,
    limit: u32,
    #[serde(default)]
    reset_delay: ResetDelay,
}

#[cfg(feature = "serde")]
impl TryFrom<PolicyConfig> for ThrottlePolicy {
    type Error = ThrottleError;

    fn try_from(config: PolicyConfig) -> Result<Self, Self::Error> {
        let interval = match (config.interval_ms, config.interval_us, config.interval_ns) {
            (Some(ms), None, None) => Duration::from_millis(ms),
            (None, Some(us), None) => Duration::from_micros(us),
            (None, None, Some(ns)) => Duration::from_nanos(ns),
            _ => return Err(ThrottleError::IntervalUnit),
        };

        ThrottlePolicy::builder()
            .interval(interval)
            .limit(config.limit)
            .reset_delay(config.reset_delay)
            .build()
    }
}

#[cfg(feature = "serde")]
impl TryFrom<&ThrottlePolicy> for PolicyConfig {
    type Error = ThrottleError;

    fn try_from(policy: &ThrottlePolicy) -> Result<Self, Self::Error> {
        let nanos = policy.interval.as_nanos();
        let whole = |unit: u128| match nanos % unit {
            0 => u64::try_from(nanos / unit).ok(),
            _ => None,
        };

        let mut config = PolicyConfig {
            limit: policy.limit,
            reset_delay: policy.reset_delay,
            ..PolicyConfig::default()
        };

        if let Some(ms) = whole(1_000_000) {
            config.interval_ms = Some(ms);
        } else if let Some(us) = whole(1_000) {
            config.interval_us = Some(us);
        } else if let Some(ns) = whole(1) {
            config.interval_ns = Some(ns);
        } else {
            return Err(ThrottleError::IntervalUnit);
        }

        Ok(config)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for ThrottlePolicy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::Error;

        let config = PolicyConfig::try_from(self).map_err(S::Error::custom)?;

        serde::Serialize::serialize(&config, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_interval_equal_0() {
        assert_eq!(
            ThrottlePolicy::builder().limit(3).build(),
            Err(ThrottleError::ZeroInterval)
        );
    }

    #[test]
    fn with_limit_equal_0() {
        assert_eq!(
            ThrottlePolicy::builder()
                .interval(Duration::from_millis(10))
                .limit(0)
                .build(),
            Err(ThrottleError::ZeroLimit)
        );
    }

    #[test]
    fn builder_defaults() {
        let policy = ThrottlePolicy::builder()
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();

        assert_eq!(policy.limit(), 1);
        assert_eq!(policy.reset_delay(), ResetDelay::FullInterval);
    }

    #[test]
    fn full_interval_delay_ignores_window_age() {
        let policy = ThrottlePolicy::new(Duration::from_millis(100), 1).unwrap();
        let start = Instant::now();

        assert_eq!(
            policy.delay_before_reset(start, start + Duration::from_millis(30)),
            Duration::from_millis(100)
        );
        assert_eq!(
            policy.delay_before_reset(start, start + Duration::from_millis(500)),
            Duration::from_millis(100)
        );
    }

    #[test]
    fn remaining_delay_counts_down_to_window_end() {
        let policy = ThrottlePolicy::builder()
            .interval(Duration::from_millis(100))
            .reset_delay(ResetDelay::Remaining)
            .build()
            .unwrap();
        let start = Instant::now();

        assert_eq!(
            policy.delay_before_reset(start, start + Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        // window already expired
        assert_eq!(
            policy.delay_before_reset(start, start + Duration::from_millis(500)),
            Duration::ZERO
        );
    }

    #[test]
    fn huge_interval_does_not_overflow() {
        let start = Instant::now();

        let policy = ThrottlePolicy::new(Duration::MAX, 1).unwrap();
        assert_eq!(policy.delay_before_reset(start, start), Duration::MAX);

        let policy = ThrottlePolicy::builder()
            .interval(Duration::MAX)
            .reset_delay(ResetDelay::Remaining)
            .build()
            .unwrap();
        assert_eq!(policy.delay_before_reset(start, start), Duration::MAX);

        assert_eq!(deadline_after(start, Duration::MAX), start + FAR_FUTURE);
        assert_eq!(
            deadline_after(start, Duration::from_millis(5)),
            start + Duration::from_millis(5)
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_policy() {
        let policy: ThrottlePolicy =
            serde_json::from_str(r#"{"interval_ms": 250, "limit": 4}"#).unwrap();
        assert_eq!(policy.interval(), Duration::from_millis(250));
        assert_eq!(policy.limit(), 4);
        assert_eq!(policy.reset_delay(), ResetDelay::FullInterval);

        let policy: ThrottlePolicy = serde_json::from_str(
            r#"{"interval_ms": 250, "limit": 4, "reset_delay": "remaining"}"#,
        )
        .unwrap();
        assert_eq!(policy.reset_delay(), ResetDelay::Remaining);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_rejects_zero_values() {
        assert!(serde_json::from_str::<ThrottlePolicy>(r#"{"interval_ms": 0, "limit": 4}"#).is_err());
        assert!(serde_json::from_str::<ThrottlePolicy>(r#"{"interval_ms": 10, "limit": 0}"#).is_err());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserialize_needs_exactly_one_interval_unit() {
        assert!(serde_json::from_str::<ThrottlePolicy>(r#"{"limit": 4}"#).is_err());
        assert!(serde_json::from_str::<ThrottlePolicy>(
            r#"{"interval_ms": 1, "interval_us": 500, "limit": 4}"#
        )
        .is_err());

        let policy: ThrottlePolicy =
            serde_json::from_str(r#"{"interval_ns": 1500, "limit": 4}"#).unwrap();
        assert_eq!(policy.interval(), Duration::from_nanos(1500));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_keeps_full_interval() {
        fn round_trip(interval: Duration, expected_json: &str) {
            let policy = ThrottlePolicy::new(interval, 3).unwrap();

            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, expected_json);

            let back: ThrottlePolicy = serde_json::from_str(&json).unwrap();
            assert_eq!(back, policy);
        }

        round_trip(
            Duration::from_millis(250),
            r#"{"interval_ms":250,"limit":3,"reset_delay":"full_interval"}"#,
        );
        // sub-millisecond
        round_trip(
            Duration::from_micros(500),
            r#"{"interval_us":500,"limit":3,"reset_delay":"full_interval"}"#,
        );
        round_trip(
            Duration::from_micros(1500),
            r#"{"interval_us":1500,"limit":3,"reset_delay":"full_interval"}"#,
        );
        round_trip(
            Duration::new(1, 1),
            r#"{"interval_ns":1000000001,"limit":3,"reset_delay":"full_interval"}"#,
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serialize_rejects_unrepresentable_interval() {
        let policy = ThrottlePolicy::new(Duration::MAX, 1).unwrap();

        assert!(serde_json::to_string(&policy).is_err());
    }
}
