//! Single-lane recurring job runner.
//!
//! The [`Scheduler`] is an owned value constructed by the process entry
//! point. Jobs are registered with a [`ScheduleSpec`] and run one at a
//! time: the next fire time of a job is computed only after its previous
//! invocation completed. Fire times that elapse while a job is running are
//! skipped, never queued: this holds for the job that overran and for every
//! other job whose fire time passed more than [`MISFIRE_GRACE_SECS`] ago.

use crate::error::{ScheduleError, ScheduleResult};
use crate::spec::ScheduleSpec;
use crate::trigger::CronTrigger;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Upper bound on a single sleep so wall-clock adjustments are picked up.
const MAX_SLEEP: Duration = Duration::from_secs(60);

/// A fire time later than this is a misfire and is skipped.
const MISFIRE_GRACE_SECS: i64 = 1;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A unit of work invoked at each fire time.
///
/// Jobs handle their own errors: nothing a job does can stop the scheduler.
pub trait Job: Send + Sync {
    fn run(&self) -> BoxFuture<'_, ()>;
}

/// Timezone in which schedule fields are evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleTimezone {
    /// System local time.
    #[default]
    Local,
    /// UTC.
    Utc,
}

impl ScheduleTimezone {
    /// Current wall-clock time in this timezone.
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Self::Local => Local::now().naive_local(),
            Self::Utc => Utc::now().naive_utc(),
        }
    }

    /// Map a wall-clock time to an instant.
    ///
    /// Returns `None` for local times skipped by a DST transition. Ambiguous
    /// local times resolve to the earlier instant.
    pub fn to_utc(&self, wall: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Self::Local => Local
                .from_local_datetime(&wall)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc)),
            Self::Utc => Some(Utc.from_utc_datetime(&wall)),
        }
    }
}

struct Registration {
    id: String,
    trigger: CronTrigger,
    job: Arc<dyn Job>,
    next_fire: Option<NaiveDateTime>,
}

/// Recurring job runner with a single execution lane.
pub struct Scheduler {
    timezone: ScheduleTimezone,
    jobs: Vec<Registration>,
}

impl Scheduler {
    pub fn new(timezone: ScheduleTimezone) -> Self {
        Self {
            timezone,
            jobs: Vec::new(),
        }
    }

    /// Register a job.
    ///
    /// The schedule is validated here, so a bad one is reported before
    /// anything runs.
    ///
    /// # Errors
    /// Returns `ScheduleError` for an invalid spec or a duplicate id.
    pub fn add_job(
        &mut self,
        id: impl Into<String>,
        spec: &ScheduleSpec,
        job: Arc<dyn Job>,
    ) -> ScheduleResult<()> {
        let id = id.into();
        if self.jobs.iter().any(|r| r.id == id) {
            return Err(ScheduleError::DuplicateJob(id));
        }

        let trigger = CronTrigger::new(spec)?;
        let next_fire = self.resolve_next(&trigger, self.timezone.now());

        match next_fire {
            Some(at) => info!(job_id = %id, next_fire = %at, "Job registered"),
            None => warn!(job_id = %id, "Job registered but schedule has no future fire time"),
        }

        self.jobs.push(Registration {
            id,
            trigger,
            job,
            next_fire,
        });
        Ok(())
    }

    /// Pending fire time of a registered job.
    pub fn next_fire_time(&self, id: &str) -> Option<NaiveDateTime> {
        self.jobs
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.next_fire)
    }

    /// Run until `shutdown` resolves or no job has a future fire time.
    ///
    /// Shutdown is only observed while waiting; a job that has started
    /// always runs to completion. Returns the number of job invocations.
    pub async fn run<F>(mut self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut executed = 0u64;

        info!(jobs = self.jobs.len(), timezone = ?self.timezone, "Scheduler started");

        loop {
            let Some((idx, fire_at)) = self.earliest() else {
                info!("No pending fire times, scheduler stopping");
                break;
            };

            let wait = self.until(fire_at);
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }
                _ = tokio::time::sleep(wait) => {}
            }
            // Sleeps are capped; re-check against the wall clock
            if !self.until(fire_at).is_zero() {
                continue;
            }

            let now = self.timezone.now();
            if now - fire_at > ChronoDuration::seconds(MISFIRE_GRACE_SECS) {
                let next = self.resolve_next(&self.jobs[idx].trigger, now);
                let registration = &mut self.jobs[idx];
                warn!(
                    job_id = %registration.id,
                    missed = %fire_at,
                    late_ms = (now - fire_at).num_milliseconds(),
                    "Fire time missed, skipping"
                );
                registration.next_fire = next;
                continue;
            }

            let registration = &self.jobs[idx];
            info!(job_id = %registration.id, fire_time = %fire_at, "Running job");
            registration.job.run().await;
            executed += 1;

            let now = self.timezone.now();
            let next = self.advance(idx, fire_at, now);
            let registration = &mut self.jobs[idx];
            registration.next_fire = next;
            match next {
                Some(at) => debug!(job_id = %registration.id, next_fire = %at, "Job rescheduled"),
                None => info!(job_id = %registration.id, "Job schedule exhausted"),
            }
        }

        info!(executed, "Scheduler stopped");
        executed
    }

    /// Next fire time after a completed run at `fire_at`.
    fn advance(&self, idx: usize, fire_at: NaiveDateTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let registration = &self.jobs[idx];
        let trigger = &registration.trigger;
        let next = self.resolve_next(trigger, fire_at + ChronoDuration::seconds(1))?;

        if next < now {
            warn!(
                job_id = %registration.id,
                missed = %next,
                "Job overran its next fire time, skipping missed runs"
            );
            return self.resolve_next(trigger, now);
        }
        Some(next)
    }

    /// Next fire time `>= from` that exists in the configured timezone.
    fn resolve_next(&self, trigger: &CronTrigger, from: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut candidate = trigger.next_fire_time(from)?;
        while self.timezone.to_utc(candidate).is_none() {
            debug!(skipped = %candidate, "Fire time does not exist in local time");
            candidate = trigger.next_fire_time(candidate + ChronoDuration::seconds(1))?;
        }
        Some(candidate)
    }

    fn earliest(&self) -> Option<(usize, NaiveDateTime)> {
        self.jobs
            .iter()
            .enumerate()
            .filter_map(|(idx, r)| r.next_fire.map(|at| (idx, at)))
            .min_by_key(|(_, at)| *at)
    }

    /// Time left until `fire_at`, capped at `MAX_SLEEP`.
    fn until(&self, fire_at: NaiveDateTime) -> Duration {
        let Some(target) = self.timezone.to_utc(fire_at) else {
            return Duration::ZERO;
        };
        (target - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_SLEEP)
    }
}
