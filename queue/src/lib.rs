//! The bounded, deduplicating in-process work queue (`spec.md` §4.4, C4)
//! that sits between the Feeder and the pipeline workers.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use rand::seq::SliceRandom;
use tendril_types::Job;
use tokio::sync::Notify;

struct State {
    items: VecDeque<Job>,
    seen: HashSet<String>,
    closed: bool,
}

/// A bounded queue of `Job`s with insertion-time deduplication by URL.
///
/// Capacity is enforced on `put`: once full, callers wait (cooperatively,
/// via `Notify`) rather than the queue growing unbounded, per `spec.md`'s
/// bounded-resource invariant. A URL already present is silently dropped
/// on the second `put` rather than queued twice — the original dedup is
/// at enqueue time, not at dequeue time, so a worker can never observe
/// the same URL in flight twice from this queue alone.
pub struct WorkQueue {
    capacity: usize,
    state: Mutex<State>,
    not_full: Notify,
    not_empty: Notify,
}

impl WorkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity.min(1024)),
                seen: HashSet::new(),
                closed: false,
            }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
        }
    }

    /// Insert `job`, waiting for room if the queue is full. Returns `false`
    /// if the queue was closed (the job was not enqueued). A duplicate URL
    /// returns `true` without occupying another slot.
    pub async fn put(&self, job: Job) -> bool {
        loop {
            {
                let mut state = self.state.lock().expect("work queue lock poisoned");
                if state.closed {
                    return false;
                }
                if !state.seen.contains(&job.url) {
                    if state.items.len() < self.capacity {
                        state.seen.insert(job.url.clone());
                        state.items.push_back(job);
                        drop(state);
                        self.not_empty.notify_one();
                        return true;
                    }
                } else {
                    return true;
                }
            }
            self.not_full.notified().await;
        }
    }

    /// Remove and return the next job, waiting if the queue is empty.
    /// Returns `None` once the queue is closed and drained.
    pub async fn get(&self) -> Option<Job> {
        loop {
            {
                let mut state = self.state.lock().expect("work queue lock poisoned");
                if let Some(job) = state.items.pop_front() {
                    state.seen.remove(&job.url);
                    drop(state);
                    self.not_full.notify_one();
                    return Some(job);
                }
                if state.closed {
                    return None;
                }
            }
            self.not_empty.notified().await;
        }
    }

    /// Non-blocking variant of `get`: `None` if nothing is queued right now.
    pub fn try_get(&self) -> Option<Job> {
        let mut state = self.state.lock().expect("work queue lock poisoned");
        let job = state.items.pop_front();
        if let Some(job) = &job {
            state.seen.remove(&job.url);
        }
        drop(state);
        if job.is_some() {
            self.not_full.notify_one();
        }
        job
    }

    /// Randomize queue order so a burst of same-host URLs from one feed
    /// batch doesn't serialize behind a single host's connection pool and
    /// robots cache slot (`spec.md` §4.4 design note).
    pub fn shuffle(&self) {
        let mut state = self.state.lock().expect("work queue lock poisoned");
        let mut items: Vec<Job> = state.items.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        state.items.extend(items);
    }

    /// Mark the queue closed: further `put`s fail, and `get` returns `None`
    /// once drained. Wakes all waiters so nobody blocks forever.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("work queue lock poisoned");
        state.closed = true;
        drop(state);
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("work queue lock poisoned").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
