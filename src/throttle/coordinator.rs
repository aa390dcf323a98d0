use std::{collections::VecDeque, mem};
use tokio::{
    sync::{mpsc, oneshot},
    time::{self, Instant},
};

use super::{
    window::{Decision, ThrottleSnapshot, ThrottleState},
    ThrottlePolicy,
};

pub(crate) enum Request {
    /// Ask to run once under `policy`. The reply fires when admitted.
    Admit {
        policy: ThrottlePolicy,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<ThrottleSnapshot>,
    },
}

struct Parked {
    policy: ThrottlePolicy,
    reply: oneshot::Sender<()>,
}

/// Single owner of a [`ThrottleState`].
///
/// All admission decisions go through this task, so "check count, increment"
/// is never interleaved between callers.
pub(crate) struct Coordinator {
    state: ThrottleState,
    parked: VecDeque<Parked>,
}

impl Coordinator {
    /// Spawn a coordinator on the current Tokio runtime.
    ///
    /// The task ends once every sender of the returned channel is dropped.
    pub fn spawn() -> mpsc::UnboundedSender<Request> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let coordinator = Self {
            state: ThrottleState::new(),
            parked: VecDeque::new(),
        };
        tokio::spawn(coordinator.run(receiver));

        sender
    }

    async fn run(mut self, mut requests: mpsc::UnboundedReceiver<Request>) {
        tracing::trace!("throttle coordinator started");

        loop {
            let reset_at = self.state.reset_at();

            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request::Admit { policy, reply }) => self.evaluate(policy, reply),
                    Some(Request::Snapshot { reply }) => {
                        // nobody listening is fine
                        let _ = reply.send(self.state.snapshot(self.parked.len()));
                    }
                    None => break,
                },
                _ = time::sleep_until(reset_at.unwrap_or_else(Instant::now)), if reset_at.is_some() => {
                    self.finish_reset();
                }
            }
        }

        tracing::trace!(parked = self.parked.len(), "throttle coordinator stopped");
    }

    fn evaluate(&mut self, policy: ThrottlePolicy, reply: oneshot::Sender<()>) {
        // caller gave up while queued
        if reply.is_closed() {
            return;
        }

        match self.state.decide(&policy, Instant::now()) {
            Decision::Admit => {
                // a failed send means the caller was dropped, so the slot stays free
                if reply.send(()).is_ok() {
                    self.state.record_admission(&policy);

                    tracing::trace!(
                        call_count = self.state.call_count(),
                        limit = policy.limit(),
                        "call admitted"
                    );
                }
            }
            Decision::Park => self.parked.push_back(Parked { policy, reply }),
            Decision::ScheduleReset(deadline) => {
                tracing::debug!(
                    delay = ?deadline.saturating_duration_since(Instant::now()),
                    call_count = self.state.call_count(),
                    limit = policy.limit(),
                    "window closed, reset scheduled"
                );

                self.parked.push_back(Parked { policy, reply });
            }
        }
    }

    fn finish_reset(&mut self) {
        self.state.reset(Instant::now());

        // re-evaluate in arrival order; whoever misses the new window parks again
        let parked = mem::take(&mut self.parked);
        tracing::debug!(parked = parked.len(), "window reset");

        for Parked { policy, reply } in parked {
            self.evaluate(policy, reply);
        }
    }
}
