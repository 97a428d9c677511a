//! Bounded admission.
//!
//! A counting semaphore with a fixed number of permits. Waiters are
//! admitted in arrival order (`tokio::sync::Semaphore` is fair), and a
//! permit is returned when the [`GatePermit`] is released or dropped.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{RolloutError, RolloutResult};

/// Caps how many operations run at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Proof of admission through a [`ConcurrencyGate`].
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl GatePermit {
    /// Return the permit to the gate.
    pub fn release(self) {}
}

impl ConcurrencyGate {
    /// A gate admitting at most `capacity` holders; zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit.
    pub async fn acquire(&self) -> RolloutResult<GatePermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RolloutError::GateClosed)?;
        Ok(GatePermit { _permit: permit })
    }

    /// Stop admitting; pending and future `acquire` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn capacity_is_at_least_one() {
        let gate = ConcurrencyGate::new(0);
        assert_eq!(gate.capacity(), 1);
        let permit = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        permit.release();
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_exceeds_capacity() {
        let gate = ConcurrencyGate::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let admitted = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..100 {
            let gate = gate.clone();
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let admitted = Arc::clone(&admitted);
            handles.push(tokio::spawn(async move {
                let permit = gate.acquire().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                admitted.fetch_add(1, Ordering::SeqCst);
                permit.release();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(admitted.load(Ordering::SeqCst), 100);
        assert_eq!(gate.available(), 3);
    }

    #[tokio::test]
    async fn waiters_are_admitted_in_arrival_order() {
        let gate = ConcurrencyGate::new(1);
        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let first = gate.acquire().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..5 {
            let gate = gate.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                order.lock().await.push(i);
            }));
            // Let the task reach the semaphore queue before spawning the next.
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        first.release();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn closed_gate_rejects_acquire() {
        let gate = ConcurrencyGate::new(2);
        gate.close();
        assert_eq!(gate.acquire().await.unwrap_err(), RolloutError::GateClosed);
    }
}
