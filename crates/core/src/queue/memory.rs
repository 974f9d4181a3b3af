//! In-process job queue.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use super::error::QueueError;
use super::traits::JobQueue;
use super::types::{Delivery, EnqueueOptions, JobHandle, NackOutcome, QueueStats, UniquifyJob};

#[derive(Debug, Clone)]
struct Entry {
    handle: JobHandle,
    job: UniquifyJob,
    options: EnqueueOptions,
    /// Deliveries so far.
    attempts_made: u32,
    seq: u64,
    ready_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    pending: Vec<Entry>,
    in_flight: HashMap<JobHandle, Entry>,
    next_seq: u64,
}

impl State {
    fn is_busy(&self, processed_video_id: &str) -> bool {
        self.in_flight
            .values()
            .any(|e| e.job.processed_video_id == processed_video_id)
    }

    /// Index of the next deliverable entry, or the earliest time one
    /// may become deliverable.
    fn next_ready(&self, now: Instant) -> Result<usize, Option<Instant>> {
        let mut best: Option<usize> = None;
        let mut wake: Option<Instant> = None;

        for (i, entry) in self.pending.iter().enumerate() {
            if self.is_busy(&entry.job.processed_video_id) {
                continue;
            }
            if entry.ready_at > now {
                wake = Some(wake.map_or(entry.ready_at, |w| w.min(entry.ready_at)));
                continue;
            }
            let better = match best {
                None => true,
                Some(b) => {
                    let current = &self.pending[b];
                    (entry.options.priority, std::cmp::Reverse(entry.seq))
                        > (current.options.priority, std::cmp::Reverse(current.seq))
                }
            };
            if better {
                best = Some(i);
            }
        }

        best.ok_or(wake)
    }
}

/// At-least-once queue held in memory.
///
/// Delivers each job to one worker at a time and never hands out two jobs
/// for the same processed video concurrently. Failed jobs come back after
/// their backoff delay until the attempt budget runs out.
#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jobs waiting or delayed for a processed video.
    pub fn pending_for(&self, processed_video_id: &str) -> Vec<UniquifyJob> {
        self.lock()
            .pending
            .iter()
            .filter(|e| e.job.processed_video_id == processed_video_id)
            .map(|e| e.job.clone())
            .collect()
    }

    fn try_take(&self) -> Result<Delivery, Option<Instant>> {
        let mut state = self.lock();
        let index = state.next_ready(Instant::now())?;
        let mut entry = state.pending.remove(index);
        entry.attempts_made += 1;

        let delivery = Delivery {
            handle: entry.handle.clone(),
            job: entry.job.clone(),
            attempt: entry.attempts_made,
            max_attempts: entry.options.attempts,
        };
        state.in_flight.insert(entry.handle.clone(), entry);
        Ok(delivery)
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job: UniquifyJob, options: EnqueueOptions) -> Result<JobHandle, QueueError> {
        if options.attempts == 0 {
            return Err(QueueError::InvalidOptions {
                reason: "attempts must be at least 1".to_string(),
            });
        }

        let handle = JobHandle::new();
        {
            let mut state = self.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            debug!(job_id = %handle.as_str(), processed_video_id = %job.processed_video_id, "Enqueued job");
            state.pending.push(Entry {
                handle: handle.clone(),
                job,
                options,
                attempts_made: 0,
                seq,
                ready_at: Instant::now(),
            });
        }
        self.notify.notify_one();
        Ok(handle)
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<Delivery>, QueueError> {
        let deadline = Instant::now() + timeout;
        loop {
            let wake = match self.try_take() {
                Ok(delivery) => return Ok(Some(delivery)),
                Err(wake) => wake,
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let until = wake.map_or(deadline, |w| w.min(deadline));
            let _ = tokio::time::timeout_at(until, self.notify.notified()).await;
        }
    }

    async fn ack(&self, handle: &JobHandle) -> Result<(), QueueError> {
        let removed = self.lock().in_flight.remove(handle);
        match removed {
            Some(_) => {
                self.notify.notify_one();
                Ok(())
            }
            None => Err(QueueError::NotInFlight {
                id: handle.0.clone(),
            }),
        }
    }

    async fn nack(&self, handle: &JobHandle, retry: bool) -> Result<NackOutcome, QueueError> {
        let outcome = {
            let mut state = self.lock();
            let mut entry = state
                .in_flight
                .remove(handle)
                .ok_or_else(|| QueueError::NotInFlight {
                    id: handle.0.clone(),
                })?;

            if retry && entry.attempts_made < entry.options.attempts {
                let delay = entry.options.backoff.delay_for(entry.attempts_made);
                entry.ready_at = Instant::now() + delay;
                let next_attempt = entry.attempts_made + 1;
                state.pending.push(entry);
                NackOutcome::Retrying {
                    next_attempt,
                    delay,
                }
            } else {
                NackOutcome::Exhausted
            }
        };
        self.notify.notify_one();
        Ok(outcome)
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<bool, QueueError> {
        let mut state = self.lock();
        if let Some(index) = state.pending.iter().position(|e| &e.handle == handle) {
            state.pending.remove(index);
            debug!(job_id = %handle.as_str(), "Cancelled queued job");
            return Ok(true);
        }
        if state.in_flight.contains_key(handle) {
            return Ok(false);
        }
        Err(QueueError::NotFound {
            id: handle.0.clone(),
        })
    }

    async fn stats(&self) -> QueueStats {
        let state = self.lock();
        let now = Instant::now();
        let delayed = state.pending.iter().filter(|e| e.ready_at > now).count();
        QueueStats {
            waiting: state.pending.len() - delayed,
            delayed,
            in_flight: state.in_flight.len(),
        }
    }
}
