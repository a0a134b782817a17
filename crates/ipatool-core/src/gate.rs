//! FIFO counting semaphore bounding concurrent tool invocations.
//!
//! A release hands its permit straight to the oldest waiter when there is
//! one, so the in-flight count only drops when nobody is queued.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::oneshot;
use tracing::trace;

use crate::config::ResolverConfig;

#[derive(Debug)]
struct GateState {
    in_flight: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// Admission primitive with strict arrival-order fairness.
#[derive(Debug)]
pub struct AdmissionGate {
    limit: usize,
    state: Mutex<GateState>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(ResolverConfig::DEFAULT_CONCURRENCY)
    }
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` holders (minimum 1).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            state: Mutex::new(GateState {
                in_flight: 0,
                waiters: VecDeque::new(),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of permits currently held.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Number of callers suspended in [`acquire`](Self::acquire).
    pub fn waiting(&self) -> usize {
        self.lock().waiters.len()
    }

    /// Wait for a permit. Never fails and never times out.
    ///
    /// Dropping the returned future before it completes gives up the place
    /// in the queue; a permit handed over in the meantime is passed on.
    pub async fn acquire(&self) {
        let receiver = {
            let mut state = self.lock();
            if state.in_flight < self.limit {
                state.in_flight += 1;
                trace!("Gate admitted immediately ({}/{})", state.in_flight, self.limit);
                return;
            }
            let (sender, receiver) = oneshot::channel();
            state.waiters.push_back(sender);
            receiver
        };

        let mut waiter = QueuedWaiter {
            gate: self,
            receiver: Some(receiver),
        };
        waiter.wait().await;
    }

    /// Return a permit, waking the longest-waiting caller if any.
    pub fn release(&self) {
        let mut state = self.lock();
        while let Some(sender) = state.waiters.pop_front() {
            // A send only fails when that waiter was dropped; try the next one.
            if sender.send(()).is_ok() {
                trace!("Gate permit handed to next waiter");
                return;
            }
        }
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Acquire a permit that is released when the guard drops.
    pub async fn permit(&self) -> GatePermit<'_> {
        self.acquire().await;
        GatePermit { gate: self }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct QueuedWaiter<'a> {
    gate: &'a AdmissionGate,
    receiver: Option<oneshot::Receiver<()>>,
}

impl QueuedWaiter<'_> {
    async fn wait(&mut self) {
        if let Some(receiver) = self.receiver.as_mut() {
            // The sender lives in the gate's queue until it is used, so an
            // error here cannot happen while the gate is alive.
            let _ = receiver.await;
        }
        self.receiver = None;
    }
}

impl Drop for QueuedWaiter<'_> {
    fn drop(&mut self) {
        if let Some(mut receiver) = self.receiver.take() {
            receiver.close();
            if receiver.try_recv().is_ok() {
                self.gate.release();
            }
        }
    }
}

/// RAII permit from [`AdmissionGate::permit`].
#[derive(Debug)]
pub struct GatePermit<'a> {
    gate: &'a AdmissionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}
