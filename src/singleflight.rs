//! Single-slot singleflight
//!
//! At most one operation is pending at a time. Callers arriving while it runs
//! join it instead of starting another, and all of them observe the same
//! result. The slot is released once the operation finishes, whatever the
//! outcome, so the next call starts fresh.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

type Pending<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

pub struct SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    slot: Mutex<Option<(u64, Pending<T, E>)>>,
    generation: AtomicU64,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `make()` unless an operation is already pending, in which case
    /// wait for that one.
    ///
    /// Returns the shared result and whether this caller started the operation.
    pub async fn work<F, Fut>(&self, make: F) -> (Result<T, E>, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (generation, pending, leader) = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some((generation, pending)) => (*generation, pending.clone(), false),
                None => {
                    let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                    let pending = make().boxed().shared();
                    *slot = Some((generation, pending.clone()));
                    (generation, pending, true)
                }
            }
        };

        let result = pending.await;
        self.release(generation);
        (result, leader)
    }

    /// Whether an operation currently occupies the slot
    pub fn is_in_flight(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    // Only clears the slot if it still holds the given operation
    fn release(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if matches!(slot.as_ref(), Some((current, _)) if *current == generation) {
            *slot = None;
        }
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let group: Arc<SingleFlight<String, String>> = Arc::new(SingleFlight::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let group = Arc::clone(&group);
            let runs = Arc::clone(&runs);
            handles.push(tokio::spawn(async move {
                group
                    .work(|| async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<_, String>("new-token".to_string())
                    })
                    .await
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let (result, leader) = handle.await.unwrap();
            assert_eq!(result.unwrap(), "new-token");
            leaders += leader as usize;
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(leaders, 1);
        assert!(!group.is_in_flight());
    }

    #[tokio::test]
    async fn test_failure_is_broadcast_and_slot_released() {
        let group: SingleFlight<String, String> = SingleFlight::new();

        let first = group.work(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<String, _>("refresh rejected".to_string())
        });
        let second = group.work(|| async { Ok::<_, String>("never".to_string()) });

        let ((a, a_leader), (b, b_leader)) = tokio::join!(first, second);
        assert_eq!(a.unwrap_err(), "refresh rejected");
        assert_eq!(b.unwrap_err(), "refresh rejected");
        assert!(a_leader);
        assert!(!b_leader);
        assert!(!group.is_in_flight());

        // A later call runs again
        let (c, c_leader) = group.work(|| async { Ok::<_, String>("fresh".to_string()) }).await;
        assert_eq!(c.unwrap(), "fresh");
        assert!(c_leader);
    }
}
