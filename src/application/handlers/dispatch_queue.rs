use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::{application::services::messenger::Message, domain::errors::MessageError};

/// What [`DispatchQueue::shutdown`] does with sends that are still running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Wait until every scheduled send has finished.
    #[default]
    Wait,
    /// Abort in-flight sends.
    Abandon,
}

impl FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "wait" => Ok(ShutdownPolicy::Wait),
            "abandon" => Ok(ShutdownPolicy::Abandon),
            other => Err(format!("unknown shutdown policy '{other}', expected wait or abandon")),
        }
    }
}

/// In-memory FIFO that schedules each message's send as its own tokio task.
///
/// `enqueue` never blocks on I/O: it appends, then drains the queue on the
/// calling thread, spawning one task per deliverable message in enqueue
/// order. Sends complete in whatever order the network allows.
pub struct DispatchQueue {
    pending: Mutex<VecDeque<Box<dyn Message>>>,
    draining: Mutex<()>,
    tasks: Mutex<JoinSet<()>>,
    handle: Handle,
    policy: ShutdownPolicy,
    closed: AtomicBool,
    scheduled: AtomicU64,
}

impl DispatchQueue {
    /// Creates a queue bound to the current tokio runtime.
    pub fn new(policy: ShutdownPolicy) -> Result<Self, MessageError> {
        let handle = Handle::try_current().map_err(|_| MessageError::Runtime)?;
        Ok(Self::with_handle(handle, policy))
    }

    pub fn with_handle(handle: Handle, policy: ShutdownPolicy) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            draining: Mutex::new(()),
            tasks: Mutex::new(JoinSet::new()),
            handle,
            policy,
            closed: AtomicBool::new(false),
            scheduled: AtomicU64::new(0),
        }
    }

    pub fn policy(&self) -> ShutdownPolicy {
        self.policy
    }

    /// Number of sends scheduled so far.
    pub fn scheduled(&self) -> u64 {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Number of scheduled sends that have not been reaped yet.
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn enqueue(&self, message: Box<dyn Message>) {
        if self.closed.load(Ordering::Acquire) {
            warn!(channel = %message.channel(), "dispatch queue is shut down, dropping message");
            return;
        }
        self.pending.lock().push_back(message);
        self.drain();
    }

    /// Schedules pending messages until the queue is observed empty.
    ///
    /// One thread drains at a time, so scheduling order is queue order. A
    /// producer that finds another drain in progress leaves its message to
    /// that drain; the re-check after releasing the drain lock makes sure
    /// nothing pushed meanwhile is left behind.
    pub fn drain(&self) {
        loop {
            let Some(guard) = self.draining.try_lock() else {
                return;
            };
            // shutdown has started waiting on the scheduled sends
            if self.closed.load(Ordering::Acquire) {
                self.discard_pending();
                return;
            }
            loop {
                // the pending lock is released before scheduling
                let next = self.pending.lock().pop_front();
                let Some(message) = next else {
                    break;
                };
                self.schedule(message);
            }
            drop(guard);
            if self.pending.lock().is_empty() {
                return;
            }
        }
    }

    fn schedule(&self, message: Box<dyn Message>) {
        let channel = message.channel();
        let Some(mut deliverable) = message.into_deliverable() else {
            debug!(%channel, "message has no send capability, dropping");
            return;
        };
        let sequence = self.scheduled.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(%channel, sequence, "scheduling send");

        let mut tasks = self.tasks.lock();
        while let Some(finished) = tasks.try_join_next() {
            Self::report_join(finished);
        }
        tasks.spawn_on(
            async move {
                if let Err(err) = deliverable.send().await {
                    error!(%channel, sequence, "send failed: {err}");
                }
            },
            &self.handle,
        );
    }

    /// Stops accepting messages and applies the shutdown policy to sends
    /// that are still running.
    ///
    /// A drain already in progress on another thread is allowed to finish
    /// first, so every send it schedules is covered by the policy.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        loop {
            if let Some(guard) = self.draining.try_lock() {
                drop(guard);
                break;
            }
            tokio::task::yield_now().await;
        }
        self.discard_pending();

        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            match self.policy {
                ShutdownPolicy::Wait => {
                    info!(in_flight = tasks.len(), "waiting for scheduled sends");
                    while let Some(finished) = tasks.join_next().await {
                        Self::report_join(finished);
                    }
                }
                ShutdownPolicy::Abandon => {
                    warn!(in_flight = tasks.len(), "abandoning scheduled sends");
                    tasks.shutdown().await;
                }
            }
        }
    }

    fn discard_pending(&self) {
        let dropped = {
            let mut pending = self.pending.lock();
            let dropped = pending.len();
            pending.clear();
            dropped
        };
        if dropped > 0 {
            warn!(dropped, "dropping messages that were never scheduled");
        }
    }

    fn report_join(result: Result<(), JoinError>) {
        if let Err(err) = result {
            if err.is_panic() {
                error!("scheduled send panicked: {err}");
            } else {
                debug!("scheduled send cancelled: {err}");
            }
        }
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        let in_flight = self.tasks.get_mut().len();
        if in_flight > 0 {
            warn!(in_flight, "dispatch queue dropped without shutdown, abandoning sends");
        }
    }
}
