//! A windowed call-rate throttle for async operations.
//!
//! # Concepts
//!
//! This crate contain three primary types: [`ThrottleFactory`], [`ThrottlePolicy`]
//! and [`Throttled`].
//!
//! A [`ThrottleFactory`] owns one window state: when the window began and how
//! many calls were admitted in it. Binding an async operation and a
//! [`ThrottlePolicy`] (`interval` + `limit`) to a factory produces a
//! [`Throttled`] operation. Every call of it begins at most `limit` times per
//! `interval`. Calls over the limit are delayed, never rejected.
//!
//! All operations built from the same factory share its window. Use separate
//! factories for limits which should not affect each other.
//!
//! Here is a running chart of a policy with `limit == 2`.
//!
//! ```text
//! c: admitted call, w: waiting for reset
//!
//! call 1:   |c()--------|
//! call 2:   |c()----|
//! call 3:    |w()-----------------------------|c()------|
//! call 4:      |w()---------------------------|c()---|
//! call 5:        |w()---------------------------------------------------|c()--|
//!           |   window    |  ^                 |   window    |  ^
//!                            \                                  \
//!                              -- call 3 opens a reset, which      -- call 5 missed the new
//!                                 always waits one full interval      window and opens the next
//!
//! time pass ----->
//! ```
//!
//! Admission decisions are made by a single coordinator task per factory,
//! so the limit is never exceeded even under heavy concurrency. Waiting
//! callers are woken when the reset they wait for completes. The order in
//! which they are admitted afterwards is not guaranteed.
//!
//! The delay before a reset is one full `interval` by default, counted from
//! the call that found the window closed. [`ResetDelay::Remaining`] waits only
//! until the window expires instead.
//!
//!
//!
//! # Examples
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use throttle_window::{ThrottleFactory, ThrottlePolicy};
//!
//! # #[tokio::main]
//! # async fn main() {
//! // Create ThrottleFactory. It must be created inside a Tokio runtime.
//! let throttles = ThrottleFactory::new();
//!
//! // at most 2 calls begin per 20ms
//! let policy = ThrottlePolicy::new(Duration::from_millis(20), 2).unwrap();
//!
//! let started_time = Instant::now();
//!
//! // here is the operation we want to throttling
//! let add_one = throttles.throttle(
//!     move |x: i32| async move {
//!         let time_passed_ms = started_time.elapsed().as_secs_f64() * 1000.0;
//!         println!("allowed job {} to start at: {:.2}ms", x, time_passed_ms);
//!
//!         x + 1
//!     },
//!     policy,
//! );
//!
//! let mut all_added_one = Vec::new();
//! for x in 1..=6 {
//!     all_added_one.push(add_one.call(x).await);
//! }
//!
//! assert_eq!(all_added_one, vec![2, 3, 4, 5, 6, 7]);
//! # }
//! ```
//!
//! Output:
//!
//! ```text
//! allowed job 1 to start at: 0.05ms
//! allowed job 2 to start at: 0.08ms
//! allowed job 3 to start at: 20.31ms
//! allowed job 4 to start at: 20.35ms
//! allowed job 5 to start at: 40.62ms
//! allowed job 6 to start at: 40.66ms
//! ```
//!
//!
//!
//! # Logging
//!
//! Window resets are reported through [`tracing`] at `debug` level, each
//! admission at `trace` level. No subscriber is installed by this crate.
//!
//!
//!
//! # Features
//!
//! - `serde`: (de)serialize [`ThrottlePolicy`] as
//!   `{ "interval_ms": .., "limit": .., "reset_delay": "full_interval" | "remaining" }`.
//!   The interval may be given as `interval_us` or `interval_ns` instead, and
//!   serializing uses the coarsest of those units which holds it exactly.
//!   Invalid values fail deserialization.

mod error;
mod throttle;
mod throttle_factory;

#[cfg(test)]
mod test_support;

#[doc(inline)]
pub use error::ThrottleError;

#[doc(inline)]
pub use throttle::{
    window::{ThrottleSnapshot, WindowPhase},
    ResetDelay, ThrottlePolicy, ThrottlePolicyBuilder,
};

#[doc(inline)]
pub use throttle_factory::{ThrottleFactory, Throttled};
