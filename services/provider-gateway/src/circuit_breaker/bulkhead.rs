//! Bulkhead: bounded concurrent executions per breaker identity.
//!
//! Up to `max_concurrent_calls` run at once; up to `queue_capacity`
//! further callers wait for a slot. Anyone beyond that is rejected
//! immediately — saturation in one bundle never spills into another.

use crate::circuit_breaker::CircuitBreakerError;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

#[derive(Debug)]
pub(crate) struct Bulkhead {
    name: String,
    permits: Arc<Semaphore>,
    queue_capacity: usize,
    waiting: AtomicUsize,
}

impl Bulkhead {
    pub(crate) fn new(name: impl Into<String>, max_concurrent_calls: usize, queue_capacity: usize) -> Self {
        Self {
            name: name.into(),
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            queue_capacity,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Acquires an execution slot, waiting in the bounded queue when all
    /// slots are busy.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitBreakerError::BulkheadFull`] when slots and queue
    /// are both saturated.
    pub(crate) async fn acquire(&self) -> Result<OwnedSemaphorePermit, CircuitBreakerError> {
        match self.permits.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(TryAcquireError::NoPermits) => {
                let already_waiting = self.waiting.fetch_add(1, Ordering::AcqRel);
                if already_waiting >= self.queue_capacity {
                    self.waiting.fetch_sub(1, Ordering::AcqRel);
                    return Err(CircuitBreakerError::BulkheadFull {
                        name: self.name.clone(),
                    });
                }
                let acquired = self.permits.clone().acquire_owned().await;
                self.waiting.fetch_sub(1, Ordering::AcqRel);
                acquired.map_err(|_| CircuitBreakerError::BulkheadFull {
                    name: self.name.clone(),
                })
            }
            Err(TryAcquireError::Closed) => Err(CircuitBreakerError::BulkheadFull {
                name: self.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_slots_up_to_limit() {
        let bulkhead = Bulkhead::new("cb", 2, 0);

        let first = bulkhead.acquire().await.unwrap();
        let _second = bulkhead.acquire().await.unwrap();
        assert!(matches!(
            bulkhead.acquire().await,
            Err(CircuitBreakerError::BulkheadFull { .. })
        ));

        drop(first);
        assert!(bulkhead.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_queued_caller_gets_freed_slot() {
        let bulkhead = Arc::new(Bulkhead::new("cb", 1, 1));

        let held = bulkhead.acquire().await.unwrap();
        let queued = tokio::spawn({
            let bulkhead = bulkhead.clone();
            async move { bulkhead.acquire().await.is_ok() }
        });

        tokio::task::yield_now().await;
        drop(held);

        assert!(queued.await.unwrap());
    }
}
