use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tendril_types::PoolError;

/// A bounded, keyed resource pool (`spec.md` §4.2, C2).
///
/// Each key gets its own semaphore capped at `max_size` concurrent
/// borrowers. A borrow first tries an idle resource for that key, then
/// falls back to `factory`. Idle resources older than `idle_timeout`
/// (measured from when they were returned) are swept out opportunistically
/// on `get`. This is the same archetype the robots cache (C3) specializes
/// to pool size 1 with TTL-based staleness instead of idle eviction.
pub struct PoolMap<K, R> {
    max_size: usize,
    idle_timeout: Duration,
    entries: Mutex<HashMap<K, Arc<Entry<R>>>>,
}

struct Entry<R> {
    semaphore: Arc<Semaphore>,
    idle: Mutex<VecDeque<Idle<R>>>,
}

struct Idle<R> {
    resource: R,
    returned_at: Instant,
}

/// A borrowed resource. Returned to the pool's idle queue on drop unless
/// `discard` was called (e.g. the resource turned out to be broken).
pub struct PoolGuard<R> {
    entry: Arc<Entry<R>>,
    resource: Option<R>,
    _permit: tokio::sync::OwnedSemaphorePermit,
}

impl<R> std::ops::Deref for PoolGuard<R> {
    type Target = R;
    fn deref(&self) -> &R {
        self.resource.as_ref().expect("resource taken only on drop")
    }
}

impl<R> std::ops::DerefMut for PoolGuard<R> {
    fn deref_mut(&mut self) -> &mut R {
        self.resource.as_mut().expect("resource taken only on drop")
    }
}

impl<R> PoolGuard<R> {
    /// Drop the resource instead of returning it to the pool.
    pub fn discard(mut self) {
        self.resource = None;
    }
}

impl<R> Drop for PoolGuard<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            let mut idle = self.entry.idle.lock().expect("pool idle lock poisoned");
            idle.push_back(Idle {
                resource,
                returned_at: Instant::now(),
            });
        }
    }
}

impl<K, R> PoolMap<K, R>
where
    K: Eq + Hash + Clone + ToString,
{
    pub fn new(max_size: usize, idle_timeout: Duration) -> Self {
        Self {
            max_size,
            idle_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry_for(&self, key: &K) -> Arc<Entry<R>> {
        let mut entries = self.entries.lock().expect("pool entries lock poisoned");
        entries
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Entry {
                    semaphore: Arc::new(Semaphore::new(self.max_size)),
                    idle: Mutex::new(VecDeque::new()),
                })
            })
            .clone()
    }

    /// Evict keys with no idle resources, no outstanding borrowers, and
    /// whose last idle resource aged out before this call ever put one
    /// there. Cheap to call on every `get`: the corpus of distinct hosts
    /// in a crawl is small relative to job volume.
    fn sweep(&self) {
        let mut entries = self.entries.lock().expect("pool entries lock poisoned");
        entries.retain(|_, entry| {
            let available = entry.semaphore.available_permits() == self.max_size;
            let mut idle = entry.idle.lock().expect("pool idle lock poisoned");
            idle.retain(|i| i.returned_at.elapsed() < self.idle_timeout);
            !(available && idle.is_empty())
        });
    }

    /// Borrow a resource for `key`, waiting up to `acquire_timeout` for a
    /// slot if the pool for that key is saturated. `factory` runs only when
    /// no idle resource is available.
    pub async fn get<F, Fut, E>(
        &self,
        key: &K,
        acquire_timeout: Duration,
        factory: F,
    ) -> Result<PoolGuard<R>, PoolError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<R, E>>,
        E: std::fmt::Display,
    {
        self.sweep();
        let entry = self.entry_for(key);

        let permit = tokio::time::timeout(acquire_timeout, entry.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| PoolError::Timeout {
                key: key.to_string(),
                timeout_secs: acquire_timeout.as_secs(),
            })?
            .expect("pool semaphore is never closed");

        let idle = {
            let mut idle = entry.idle.lock().expect("pool idle lock poisoned");
            idle.pop_front()
        };

        let resource = match idle {
            Some(i) => i.resource,
            None => factory().await.map_err(|e| PoolError::Factory {
                key: key.to_string(),
                message: e.to_string(),
            })?,
        };

        Ok(PoolGuard {
            entry,
            resource: Some(resource),
            _permit: permit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reuses_idle_resource() {
        let pool: PoolMap<String, u32> = PoolMap::new(1, Duration::from_secs(60));
        let key = "host".to_string();
        let mut calls = 0;

        {
            let guard = pool
                .get(&key, Duration::from_secs(1), || async {
                    calls += 1;
                    Ok::<_, std::convert::Infallible>(42)
                })
                .await
                .unwrap();
            assert_eq!(*guard, 42);
        }

        let guard = pool
            .get(&key, Duration::from_secs(1), || async {
                calls += 1;
                Ok::<_, std::convert::Infallible>(0)
            })
            .await
            .unwrap();
        assert_eq!(*guard, 42);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn saturated_pool_times_out() {
        let pool: PoolMap<String, u32> = PoolMap::new(1, Duration::from_secs(60));
        let key = "host".to_string();

        let _held = pool
            .get(&key, Duration::from_secs(1), || async {
                Ok::<_, std::convert::Infallible>(1)
            })
            .await
            .unwrap();

        let err = pool
            .get(&key, Duration::from_millis(50), || async {
                Ok::<_, std::convert::Infallible>(2)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn discarded_resource_is_not_reused() {
        let pool: PoolMap<String, u32> = PoolMap::new(1, Duration::from_secs(60));
        let key = "host".to_string();
        let mut calls = 0;

        {
            let guard = pool
                .get(&key, Duration::from_secs(1), || async {
                    calls += 1;
                    Ok::<_, std::convert::Infallible>(calls)
                })
                .await
                .unwrap();
            guard.discard();
        }

        let guard = pool
            .get(&key, Duration::from_secs(1), || async {
                calls += 1;
                Ok::<_, std::convert::Infallible>(calls)
            })
            .await
            .unwrap();
        assert_eq!(*guard, 2);
    }
}
