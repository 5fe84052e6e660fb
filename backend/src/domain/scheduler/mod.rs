//! In-process job scheduler with fleet-wide lease locking.
//!
//! Each registered job runs on its own Tokio task. A job never overlaps with
//! itself: a firing that arrives while the previous run is still executing
//! is rescheduled, and every run first takes the lease lock keyed by the job
//! name so that only one replica in the fleet executes it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::join_all;
use mockable::Clock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::domain::ports::ScheduledTask;

mod lease;
mod schedule;

pub use lease::{DEFAULT_LEASE, LeaseGuard, LeaseLocker, LockError};
pub use schedule::ScheduleSpec;

/// A job whose last run started within this window is reported as running.
const RUNNING_WINDOW_SECS: i64 = 5;

/// Errors returned by scheduler registration and control calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// A job with the same name is already registered.
    #[error("job {name} already registered")]
    DuplicateJob {
        /// Job name.
        name: String,
    },

    /// No job with this name is registered.
    #[error("job {name} not found")]
    JobNotFound {
        /// Job name.
        name: String,
    },

    /// The schedule text matched no supported form.
    #[error("invalid schedule format: {spec} ({reason})")]
    InvalidSchedule {
        /// Schedule text as supplied.
        spec: String,
        /// Parser detail.
        reason: String,
    },
}

/// Point-in-time view of one job for status read models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Job name.
    pub name: String,
    /// Schedule text as registered.
    pub schedule: String,
    /// When the most recent run started.
    pub last_run: Option<DateTime<Utc>>,
    /// When the job fires next, once the scheduler is started.
    pub next_run: Option<DateTime<Utc>>,
    /// Whether the last run started under five seconds ago.
    pub is_running: bool,
}

/// Result of one attempted run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The task ran and succeeded.
    Completed,
    /// The task ran and failed.
    Failed {
        /// Task failure message.
        message: String,
    },
    /// Another replica holds the job's lease; the tick was skipped.
    LockHeld,
    /// The lease table was unavailable; the tick was skipped.
    LockUnavailable {
        /// Lock failure message.
        message: String,
    },
    /// A previous run of this job is still executing; the tick was skipped.
    AlreadyRunning,
}

#[derive(Debug, Default, Clone, Copy)]
struct JobTimes {
    last_run: Option<DateTime<Utc>>,
    next_run: Option<DateTime<Utc>>,
}

struct Job {
    name: String,
    schedule: String,
    spec: ScheduleSpec,
    task: Arc<dyn ScheduledTask>,
    times: Mutex<JobTimes>,
    run_gate: tokio::sync::Mutex<()>,
}

impl Job {
    fn times(&self) -> MutexGuard<'_, JobTimes> {
        self.times.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

struct JobSlot {
    job: Arc<Job>,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct SchedulerState {
    jobs: BTreeMap<String, JobSlot>,
    started: bool,
}

/// Executes runs under the lease lock.
struct JobRunner {
    locker: LeaseLocker,
    clock: Arc<dyn Clock>,
}

impl JobRunner {
    async fn run(&self, job: &Job) -> RunOutcome {
        let Ok(_gate) = job.run_gate.try_lock() else {
            debug!(job = %job.name, "previous run still executing; rescheduling");
            return RunOutcome::AlreadyRunning;
        };

        let guard = match self.locker.lock(&job.name).await {
            Ok(guard) => guard,
            Err(LockError::HeldByAnotherProcess { .. }) => {
                debug!(job = %job.name, "lease held elsewhere; skipping tick");
                return RunOutcome::LockHeld;
            }
            Err(err) => {
                warn!(job = %job.name, error = %err, "lease unavailable; skipping tick");
                return RunOutcome::LockUnavailable {
                    message: err.to_string(),
                };
            }
        };

        job.times().last_run = Some(self.clock.utc());
        info!(job = %job.name, "job is starting");
        let outcome = match job.task.run().await {
            Ok(()) => {
                info!(job = %job.name, "job completed");
                RunOutcome::Completed
            }
            Err(err) => {
                error!(job = %job.name, error = %err, "job failed");
                RunOutcome::Failed {
                    message: err.to_string(),
                }
            }
        };

        if let Err(err) = guard.unlock().await {
            warn!(job = %job.name, error = %err, "failed to release job lease");
        }
        outcome
    }
}

enum Wake {
    Tick,
    Signal,
    Closed,
}

async fn job_loop(job: Arc<Job>, runner: Arc<JobRunner>, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        let now = runner.clock.utc();
        let Some(next) = job.spec.next_after(now) else {
            warn!(job = %job.name, "schedule has no further firings");
            job.times().next_run = None;
            break;
        };
        job.times().next_run = Some(next);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

        let wake = tokio::select! {
            () = tokio::time::sleep(wait) => Wake::Tick,
            changed = shutdown.changed() => {
                if changed.is_ok() { Wake::Signal } else { Wake::Closed }
            }
        };

        match wake {
            Wake::Tick => {
                runner.run(&job).await;
            }
            Wake::Signal => {}
            Wake::Closed => break,
        }
    }
    job.times().next_run = None;
}

/// Registry and runtime for scheduled jobs.
///
/// # Examples
///
/// ```rust,ignore
/// let scheduler = Scheduler::new(locker, Arc::new(DefaultClock));
/// scheduler.register_job("sync-repo-acme/site", "*/1 * * * *", task)?;
/// scheduler.start();
/// // ...
/// scheduler.stop().await;
/// ```
pub struct Scheduler {
    runner: Arc<JobRunner>,
    state: Mutex<SchedulerState>,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    /// Build a stopped scheduler.
    pub fn new(locker: LeaseLocker, clock: Arc<dyn Clock>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runner: Arc::new(JobRunner { locker, clock }),
            state: Mutex::new(SchedulerState::default()),
            shutdown,
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self, job: Arc<Job>) -> JoinHandle<()> {
        tokio::spawn(job_loop(
            job,
            Arc::clone(&self.runner),
            self.shutdown.subscribe(),
        ))
    }

    /// Register `task` under `name` with a textual schedule.
    ///
    /// When the scheduler is already started the job begins firing
    /// immediately, which requires a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::DuplicateJob`] for a taken name and
    /// [`SchedulerError::InvalidSchedule`] for unparseable schedule text.
    pub fn register_job(
        &self,
        name: &str,
        schedule: &str,
        task: Arc<dyn ScheduledTask>,
    ) -> Result<(), SchedulerError> {
        let spec = ScheduleSpec::parse(schedule)?;
        let mut state = self.state();
        if state.jobs.contains_key(name) {
            return Err(SchedulerError::DuplicateJob {
                name: name.to_owned(),
            });
        }

        let job = Arc::new(Job {
            name: name.to_owned(),
            schedule: schedule.to_owned(),
            spec,
            task,
            times: Mutex::new(JobTimes::default()),
            run_gate: tokio::sync::Mutex::new(()),
        });
        let handle = state.started.then(|| self.spawn(Arc::clone(&job)));
        state.jobs.insert(name.to_owned(), JobSlot { job, handle });
        info!(job = name, schedule, "registered job");
        Ok(())
    }

    /// Unregister a job, cancelling its timer.
    ///
    /// A run already in progress is aborted at its next await point.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JobNotFound`] for an unknown name.
    pub fn remove_job(&self, name: &str) -> Result<(), SchedulerError> {
        let slot = self
            .state()
            .jobs
            .remove(name)
            .ok_or_else(|| SchedulerError::JobNotFound {
                name: name.to_owned(),
            })?;
        if let Some(handle) = slot.handle {
            handle.abort();
        }
        info!(job = name, "removed job");
        Ok(())
    }

    /// Start firing every registered job. Must be called within a Tokio
    /// runtime; calling it on a started scheduler is a no-op.
    pub fn start(&self) {
        let mut state = self.state();
        if state.started {
            return;
        }
        state.started = true;
        self.shutdown.send_replace(false);

        let pending: Vec<Arc<Job>> = state
            .jobs
            .values()
            .filter(|slot| slot.handle.is_none())
            .map(|slot| Arc::clone(&slot.job))
            .collect();
        for job in pending {
            let name = job.name.clone();
            let handle = self.spawn(job);
            if let Some(slot) = state.jobs.get_mut(&name) {
                slot.handle = Some(handle);
            }
        }
        info!(jobs = state.jobs.len(), "scheduler started");
    }

    /// Stop all timers and wait for in-flight runs to finish.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.state();
            state.started = false;
            state
                .jobs
                .values_mut()
                .filter_map(|slot| slot.handle.take())
                .collect()
        };
        self.shutdown.send_replace(true);

        for result in join_all(handles).await {
            if let Err(err) = result {
                if !err.is_cancelled() {
                    warn!(error = %err, "job task ended abnormally");
                }
            }
        }
        info!("scheduler stopped");
    }

    /// Run a job immediately, outside its schedule.
    ///
    /// The run still honours singleton mode and the lease lock.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::JobNotFound`] for an unknown name.
    pub async fn run_job_now(&self, name: &str) -> Result<RunOutcome, SchedulerError> {
        let job = self
            .state()
            .jobs
            .get(name)
            .map(|slot| Arc::clone(&slot.job))
            .ok_or_else(|| SchedulerError::JobNotFound {
                name: name.to_owned(),
            })?;
        Ok(self.runner.run(&job).await)
    }

    /// Names of registered jobs in lexical order.
    pub fn list_jobs(&self) -> Vec<String> {
        self.state().jobs.keys().cloned().collect()
    }

    /// Status of every registered job in lexical order.
    pub fn job_statuses(&self) -> Vec<JobStatus> {
        let now = self.runner.clock.utc();
        let window = TimeDelta::seconds(RUNNING_WINDOW_SECS);
        self.state()
            .jobs
            .values()
            .map(|slot| {
                let times = *slot.job.times();
                JobStatus {
                    name: slot.job.name.clone(),
                    schedule: slot.job.schedule.clone(),
                    last_run: times.last_run,
                    next_run: times.next_run,
                    is_running: times.last_run.is_some_and(|last| now - last < window),
                }
            })
            .collect()
    }
}
