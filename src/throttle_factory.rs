use std::{
    fmt::{self, Debug},
    future::Future,
};
use tokio::sync::{mpsc, oneshot};

use crate::{
    throttle::coordinator::{Coordinator, Request},
    ThrottleError, ThrottlePolicy, ThrottleSnapshot,
};

const STOPPED: &str = "throttle coordinator stopped while its factory is alive; was the runtime shut down?";

/// Owner of one shared window state.
///
/// Every [`Throttled`] operation created from the same factory (and every
/// [`run()`](Self::run) on it) counts against the same window. Cloning a
/// factory shares the state as well. Separate factories never interfere.
///
/// See [module](crate) document for more detail.
#[derive(Clone)]
pub struct ThrottleFactory {
    requests: mpsc::UnboundedSender<Request>,
}

impl ThrottleFactory {
    /// Create a factory with a fresh, empty window state.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new() -> Self {
        Self {
            requests: Coordinator::spawn(),
        }
    }

    /// Bind an operation and a policy into a throttled callable.
    ///
    /// The operation takes a single argument; use a tuple to pass several.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use throttle_window::{ThrottleFactory, ThrottlePolicy};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let policy = ThrottlePolicy::new(Duration::from_millis(10), 2).unwrap();
    /// let add = ThrottleFactory::new().throttle(|(a, b): (i32, i32)| async move { a + b }, policy);
    ///
    /// assert_eq!(add.call((1, 2)).await, 3);
    /// # }
    /// ```
    pub fn throttle<F>(&self, op: F, policy: ThrottlePolicy) -> Throttled<F> {
        Throttled {
            factory: self.clone(),
            op,
            policy,
        }
    }

    /// Run a one-shot async closure under `policy`, counted against this factory.
    ///
    /// # Panics
    ///
    /// Panics if the coordinator has stopped, see [`try_run()`](Self::try_run).
    pub async fn run<F, Fut>(&self, policy: &ThrottlePolicy, f: F) -> Fut::Output
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.try_run(policy, f).await.expect(STOPPED)
    }

    /// Like [`run()`](Self::run) but report a stopped coordinator as an error.
    ///
    /// `f` is not called at all when an error is returned.
    pub async fn try_run<F, Fut>(&self, policy: &ThrottlePolicy, f: F) -> Result<Fut::Output, ThrottleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.acquire(policy).await?;

        Ok(f().await)
    }

    /// Read the current window state.
    pub async fn snapshot(&self) -> Result<ThrottleSnapshot, ThrottleError> {
        let (reply, response) = oneshot::channel();

        self.requests
            .send(Request::Snapshot { reply })
            .map_err(|_| ThrottleError::CoordinatorStopped)?;

        response.await.map_err(|_| ThrottleError::CoordinatorStopped)
    }

    /// Wait until the coordinator admits one call under `policy`.
    ///
    /// Dropping the returned future before it completes withdraws the request
    /// without consuming a slot.
    async fn acquire(&self, policy: &ThrottlePolicy) -> Result<(), ThrottleError> {
        let (reply, admitted) = oneshot::channel();

        self.requests
            .send(Request::Admit {
                policy: *policy,
                reply,
            })
            .map_err(|_| ThrottleError::CoordinatorStopped)?;

        admitted.await.map_err(|_| ThrottleError::CoordinatorStopped)
    }
}

impl Default for ThrottleFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ThrottleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleFactory")
            .field("running", &!self.requests.is_closed())
            .finish()
    }
}

/// An operation bound to a [`ThrottlePolicy`] and a factory's window.
///
/// Created by [`ThrottleFactory::throttle()`] API.
#[derive(Clone)]
pub struct Throttled<F> {
    factory: ThrottleFactory,
    op: F,
    policy: ThrottlePolicy,
}

impl<F> Throttled<F> {
    /// Invoke the operation with `args`.
    ///
    /// Runs at once when the current window has room, otherwise waits for
    /// the window to reset. The operation's output, success or failure, is
    /// returned unchanged.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    /// use throttle_window::{ThrottleFactory, ThrottlePolicy};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let policy = ThrottlePolicy::new(Duration::from_millis(50), 2).unwrap();
    /// let double = ThrottleFactory::new().throttle(|x: u32| async move { x * 2 }, policy);
    ///
    /// let started = Instant::now();
    /// let (a, b, c) = tokio::join!(double.call(1), double.call(2), double.call(3));
    ///
    /// assert_eq!((a, b, c), (2, 4, 6));
    /// // the third call had to wait for the window to reset
    /// assert!(started.elapsed() >= Duration::from_millis(50));
    /// # }
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if the coordinator has stopped, see [`try_call()`](Self::try_call).
    pub async fn call<A, Fut>(&self, args: A) -> Fut::Output
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        self.try_call(args).await.expect(STOPPED)
    }

    /// Like [`call()`](Self::call) but report a stopped coordinator as an error.
    pub async fn try_call<A, Fut>(&self, args: A) -> Result<Fut::Output, ThrottleError>
    where
        F: Fn(A) -> Fut,
        Fut: Future,
    {
        self.factory.acquire(&self.policy).await?;

        Ok((self.op)(args).await)
    }

    /// Policy this operation is throttled under.
    pub fn policy(&self) -> &ThrottlePolicy {
        &self.policy
    }

    /// The factory whose window this operation counts against.
    pub fn factory(&self) -> &ThrottleFactory {
        &self.factory
    }
}

impl<F> Debug for Throttled<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(&format!("Throttled<{}>", std::any::type_name::<F>()))
            .field("policy", &self.policy)
            .finish()
    }
}
