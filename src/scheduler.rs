//! Background solve execution with "latest submission wins" delivery per task key.
//!
//! Every key owns a generation counter and a single-slot mailbox. Submitting under a key bumps
//! its generation; a workload that completes with an older generation than its key's current
//! one has been superseded and its outcome is dropped instead of delivered. Running workloads
//! are never interrupted.
//!
//! Completed outcomes wait in their mailbox until the consumer calls
//! [`SolveScheduler::drain`] from its own thread.

use crate::workload::{SolveOutput, Workload};
use carbspec_core::{SolveError, SolveResult};
use log::{debug, warn};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Failure delivered in place of a workload's output.
#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("Workload panicked: {0}")]
    WorkloadPanicked(String),
}

/// Identifies one submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub key: String,
    pub generation: u64,
}

/// Outcome of the latest submission under a key.
#[derive(Debug)]
pub struct Delivery {
    pub key: String,
    pub generation: u64,
    pub outcome: Result<SolveOutput, ScheduleError>,
}

#[derive(Debug, Default)]
struct KeySlot {
    generation: u64,
    mailbox: Option<Delivery>,
}

#[derive(Debug, Default)]
struct Shared {
    slots: Mutex<HashMap<String, KeySlot>>,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Shared {
    fn complete(&self, key: String, generation: u64, outcome: Result<SolveOutput, ScheduleError>) {
        {
            let mut slots = lock(&self.slots);
            match slots.get_mut(&key) {
                Some(slot) if slot.generation == generation => {
                    if let Err(error) = &outcome {
                        warn!("Task {key} (generation {generation}) failed: {error}");
                    }
                    slot.mailbox = Some(Delivery {
                        key,
                        generation,
                        outcome,
                    });
                }
                Some(slot) => debug!(
                    "Dropping superseded result for {key}: generation {generation}, latest {}",
                    slot.generation
                ),
                None => debug!("Dropping result for unknown task {key}"),
            }
        }

        let mut in_flight = lock(&self.in_flight);
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.idle.notify_all();
        }
    }
}

/// Runs workloads on a rayon pool and hands back only the newest outcome per key.
pub struct SolveScheduler {
    pool: ThreadPool,
    shared: Arc<Shared>,
}

impl SolveScheduler {
    /// Scheduler with `num_threads` workers; zero lets rayon choose.
    pub fn new(num_threads: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("carbspec-solve-{i}"))
            .build()?;
        Ok(Self {
            pool,
            shared: Arc::new(Shared::default()),
        })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `task` under `key`, superseding any earlier submission under the same key.
    ///
    /// An undelivered outcome of an earlier submission is discarded immediately.
    pub fn submit<F>(&self, key: impl Into<String>, task: F) -> TaskHandle
    where
        F: FnOnce() -> SolveResult<SolveOutput> + Send + 'static,
    {
        let key = key.into();
        let generation = {
            let mut slots = lock(&self.shared.slots);
            let slot = slots.entry(key.clone()).or_default();
            slot.generation += 1;
            if let Some(stale) = slot.mailbox.take() {
                debug!(
                    "Discarding undelivered result for {key} (generation {})",
                    stale.generation
                );
            }
            slot.generation
        };
        *lock(&self.shared.in_flight) += 1;

        debug!("Submitting {key} (generation {generation})");
        let shared = Arc::clone(&self.shared);
        let task_key = key.clone();
        self.pool.spawn(move || {
            let outcome = match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(error)) => Err(ScheduleError::Solve(error)),
                Err(payload) => Err(ScheduleError::WorkloadPanicked(panic_message(payload))),
            };
            shared.complete(task_key, generation, outcome);
        });

        TaskHandle { key, generation }
    }

    pub fn submit_workload(&self, key: impl Into<String>, workload: Workload) -> TaskHandle {
        self.submit(key, move || workload.run())
    }

    /// Whether `handle` is still the newest submission under its key.
    pub fn is_latest(&self, handle: &TaskHandle) -> bool {
        lock(&self.shared.slots)
            .get(&handle.key)
            .is_some_and(|slot| slot.generation == handle.generation)
    }

    /// Take every delivered outcome, ordered by key.
    pub fn drain(&self) -> Vec<Delivery> {
        let mut deliveries: Vec<Delivery> = lock(&self.shared.slots)
            .values_mut()
            .filter_map(|slot| slot.mailbox.take())
            .collect();
        deliveries.sort_by(|a, b| a.key.cmp(&b.key));
        deliveries
    }

    /// Take the delivered outcome for `key`, if any.
    pub fn take(&self, key: &str) -> Option<Delivery> {
        lock(&self.shared.slots)
            .get_mut(key)
            .and_then(|slot| slot.mailbox.take())
    }

    /// Number of submitted workloads that have not finished yet, superseded ones included.
    pub fn in_flight(&self) -> usize {
        *lock(&self.shared.in_flight)
    }

    /// Block until no workload is running or queued.
    pub fn wait_idle(&self) {
        let mut in_flight = lock(&self.shared.in_flight);
        while *in_flight > 0 {
            in_flight = self
                .shared
                .idle
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
