/// Error type for this crate.
///
/// Failures of the throttled operation itself are never wrapped in this type:
/// the operation's output is handed back to the caller as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ThrottleError {
    /// The policy interval was zero.
    #[error("throttle interval must be greater than zero")]
    ZeroInterval,
    /// The policy limit was zero.
    #[error("throttle limit must be greater than zero")]
    ZeroLimit,
    /// A serialized policy did not give its interval as exactly one whole
    /// `interval_ms`, `interval_us` or `interval_ns` value fitting in `u64`.
    #[cfg(feature = "serde")]
    #[error("throttle interval must be given as exactly one of interval_ms, interval_us or interval_ns")]
    IntervalUnit,
    /// The coordinator task of a factory is no longer running, usually because
    /// the runtime it was spawned on has shut down.
    #[error("throttle coordinator is no longer running")]
    CoordinatorStopped,
}
