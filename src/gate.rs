//! Admission gate: a process-wide counting limiter for heavy operations.
//!
//! Every image decode and page render runs while holding one slot. Waiters are
//! queued and granted in arrival order; a slot is handed back when the
//! returned [`AdmissionPermit`] is dropped, so release happens on every exit
//! path including errors, timeouts and panics.

use crate::{Error, Result};
use log::debug;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting limiter with a FIFO wait queue.
///
/// Cloning is cheap and every clone shares the same slots; construct one at
/// startup and hand clones to request handlers.
#[derive(Clone, Debug)]
pub struct AdmissionGate {
    slots: Arc<Semaphore>,
    capacity: usize,
}

/// A held slot. Dropping it releases the slot to the longest waiter.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    /// Create a gate with `capacity` slots. Capacity must be positive.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Config("admission capacity must be at least 1".into()));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        })
    }

    /// Wait (without spinning) until a slot is free and take it.
    pub async fn acquire(&self) -> Result<AdmissionPermit> {
        if self.slots.available_permits() == 0 {
            debug!("admission gate full ({} in use), waiting", self.capacity);
        }
        // tokio's semaphore queues acquirers fairly, which gives the FIFO grant order.
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("Admission gate closed: {}", e)))?;
        debug!("admission slot granted ({}/{} in use)", self.in_use(), self.capacity);
        Ok(AdmissionPermit { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.slots)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Fixed number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently held.
    pub fn in_use(&self) -> usize {
        self.capacity - self.slots.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(AdmissionGate::new(0), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn permits_are_counted_and_released_on_drop() {
        let gate = AdmissionGate::new(2).unwrap();
        let a = gate.acquire().await.unwrap();
        let b = gate.acquire().await.unwrap();
        assert_eq!(gate.in_use(), 2);
        assert!(gate.try_acquire().is_none());

        drop(a);
        assert_eq!(gate.in_use(), 1);
        let c = gate.try_acquire().expect("slot should be free after drop");
        assert_eq!(gate.in_use(), 2);
        drop(b);
        drop(c);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn release_happens_on_error_paths() {
        let gate = AdmissionGate::new(1).unwrap();

        async fn failing(gate: &AdmissionGate) -> Result<()> {
            let _permit = gate.acquire().await?;
            Err(Error::FetchFailed("upstream returned 502".into()))
        }

        assert!(failing(&gate).await.is_err());
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_holders_never_exceed_capacity() {
        let gate = AdmissionGate::new(3).unwrap();
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..24 {
            let gate = gate.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                assert!(gate.in_use() <= gate.capacity());
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(gate.in_use(), 0);
    }

    #[tokio::test]
    async fn waiters_are_granted_in_arrival_order() {
        let gate = AdmissionGate::new(1).unwrap();
        let held = gate.acquire().await.unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..5 {
            let gate = gate.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _permit = gate.acquire().await.unwrap();
                order.lock().unwrap().push(id);
            }));
            // Let each task reach the wait queue before spawning the next.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(held);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Any interleaving of takes and drops keeps `in_use` in `0..=capacity`
            /// and refuses a take exactly when the gate is full.
            #[test]
            fn in_use_tracks_held_permits(
                capacity in 1usize..6,
                ops in proptest::collection::vec(any::<bool>(), 0..64),
            ) {
                let gate = AdmissionGate::new(capacity).unwrap();
                let mut held = Vec::new();
                for take in ops {
                    if take {
                        let full = held.len() == capacity;
                        match gate.try_acquire() {
                            Some(permit) => {
                                prop_assert!(!full);
                                held.push(permit);
                            }
                            None => prop_assert!(full),
                        }
                    } else {
                        held.pop();
                    }
                    prop_assert_eq!(gate.in_use(), held.len());
                    prop_assert!(gate.in_use() <= gate.capacity());
                }
            }
        }
    }
}
