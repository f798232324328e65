//! Concurrency gate bounding simultaneously running tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use noteflow_core::{Error, Result};

/// Counting semaphore acquired before a task transitions `pending → running`.
///
/// The permit is held for the task's whole execution and released on any
/// terminal transition (the permit is dropped with the worker). Acquisition
/// is bounded: a task that cannot get a slot within the queue-wait timeout
/// fails with `capacity_exceeded` instead of queueing forever.
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    queue_wait: Duration,
}

impl ConcurrencyGate {
    /// Gate with `capacity` slots and the given queue-wait timeout.
    pub fn new(capacity: usize, queue_wait: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            queue_wait,
        }
    }

    /// Acquire a slot, waiting at most the queue-wait timeout.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        match timeout(self.queue_wait, self.semaphore.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(Error::Internal("concurrency gate closed".to_string())),
            Err(_) => Err(Error::CapacityExceeded("capacity exceeded".to_string())),
        }
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}
