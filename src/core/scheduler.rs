use crate::core::gpu::GpuSnapshot;
use crate::core::job::{Job, JobSpec, JobState, MAX_WATERMARK};
use crate::core::policy::{EarliestSubmitted, SelectionPolicy};
use crate::core::JobId;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("Pending queue is full ({capacity} jobs)")]
    QueueFull { capacity: usize },
    #[error("Job command must not be empty")]
    EmptyCommand,
}

/// A job taken out of the registry by [`Scheduler::delete`].
#[derive(Debug, Clone)]
pub struct DeletedJob {
    pub job: Job,
    /// The job was `Active` and its process, if any, must be terminated.
    pub was_active: bool,
}

/// Owns the job registry and every job state transition.
///
/// The scheduler itself is synchronous and does no I/O: the daemon wraps it
/// in a lock and drives it from the tick loop, the HTTP handlers and the
/// completion callbacks.
pub struct Scheduler {
    /// Registry in submission order.
    jobs: Vec<Job>,
    max_queue_size: usize,
    default_watermark: u8,
    policy: Box<dyn SelectionPolicy>,
}

impl Default for Scheduler {
    fn default() -> Self {
        SchedulerBuilder::new().build()
    }
}

impl Scheduler {
    /// Appends a new `Pending` job. Fails once the registry holds `max_queue_size` jobs.
    pub fn submit(&mut self, spec: JobSpec) -> Result<JobId, SchedulerError> {
        self.submit_at(spec, SystemTime::now())
    }

    pub fn submit_at(
        &mut self,
        spec: JobSpec,
        submitted_at: SystemTime,
    ) -> Result<JobId, SchedulerError> {
        if self.jobs.len() >= self.max_queue_size {
            return Err(SchedulerError::QueueFull {
                capacity: self.max_queue_size,
            });
        }
        if spec.command.is_empty() || spec.command[0].is_empty() {
            return Err(SchedulerError::EmptyCommand);
        }

        let job = Job::from_spec(spec, submitted_at);
        let job_id = job.id;
        tracing::info!(job_id = %job_id, command = %job.command_line(), gpus = ?job.gpu_ids, "Job submitted");
        self.jobs.push(job);
        Ok(job_id)
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Point-in-time copy of the registry.
    pub fn list(&self) -> Vec<Job> {
        self.jobs.clone()
    }

    pub fn get_job(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == job_id)
    }

    fn get_job_mut(&mut self, job_id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id == job_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    pub fn default_watermark(&self) -> u8 {
        self.default_watermark
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Removes a job from the registry. An `Active` job is marked `Finished`
    /// on the way out; terminating its process is up to the caller.
    pub fn delete(&mut self, job_id: JobId) -> Option<DeletedJob> {
        let position = self.jobs.iter().position(|j| j.id == job_id)?;
        let mut job = self.jobs.remove(position);
        let was_active = job.state == JobState::Active;
        if was_active {
            job.try_transition(JobState::Finished);
        }
        tracing::info!(job_id = %job_id, was_active, "Job deleted");
        Some(DeletedJob { job, was_active })
    }

    /// Marks every `Active` job `Finished` and returns them so the caller can
    /// signal their processes. The jobs stay in the registry until the next scan.
    pub fn terminate_all(&mut self) -> Vec<Job> {
        self.jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Active)
            .filter_map(|job| job.try_transition(JobState::Finished).then(|| job.clone()))
            .collect()
    }

    /// One admission tick against a fresh snapshot.
    ///
    /// Drops `Finished` jobs, promotes every `Pending` job whose devices are
    /// under the watermark to `Ready`, lets the policy pick one of them, marks it
    /// `Active` and sends the rest back to `Pending`. Returns the job to launch.
    pub fn schedule(&mut self, snapshot: &[GpuSnapshot]) -> Option<Job> {
        self.purge_finished();

        let default_watermark = self.default_watermark;
        let mut ready = 0usize;
        for job in self
            .jobs
            .iter_mut()
            .filter(|j| j.state == JobState::Pending)
        {
            if job.fits(snapshot, default_watermark) && job.try_transition(JobState::Ready) {
                ready += 1;
            }
        }

        if ready == 0 {
            tracing::debug!(pending = self.jobs.len(), "No ready job this tick");
            return None;
        }

        let selected = {
            let candidates: Vec<&Job> = self
                .jobs
                .iter()
                .filter(|j| j.state == JobState::Ready)
                .collect();
            self.policy.select(&candidates).map(|job| job.id)
        };

        let mut launched = None;
        for job in self.jobs.iter_mut().filter(|j| j.state == JobState::Ready) {
            if Some(job.id) == selected && job.try_transition(JobState::Active) {
                job.pid = None;
                launched = Some(job.clone());
            } else {
                job.try_transition(JobState::Pending);
            }
        }

        if let Some(job) = &launched {
            tracing::info!(
                job_id = %job.id,
                ready,
                policy = self.policy.name(),
                "Selected job for launch"
            );
        }
        launched
    }

    fn purge_finished(&mut self) {
        self.jobs.retain(|job| {
            let keep = job.state != JobState::Finished;
            if !keep {
                tracing::debug!(job_id = %job.id, "Removing finished job from registry");
            }
            keep
        });
    }

    /// Records the pid of a launched process. Returns `false` when the job is
    /// gone or no longer `Active`, in which case the process is unwanted.
    pub fn record_pid(&mut self, job_id: JobId, pid: u32) -> bool {
        match self.get_job_mut(job_id) {
            Some(job) if job.state == JobState::Active => {
                job.pid = Some(pid);
                true
            }
            _ => false,
        }
    }

    /// The process ran to completion.
    pub fn on_success(&mut self, job_id: JobId) -> bool {
        match self.get_job_mut(job_id) {
            Some(job) if job.state == JobState::Active => {
                job.try_transition(JobState::Finished);
                tracing::info!(job_id = %job_id, pid = ?job.pid, "Job finished");
                true
            }
            Some(job) => {
                tracing::debug!(job_id = %job_id, state = %job.state, "Ignoring completion");
                false
            }
            None => {
                tracing::debug!(job_id = %job_id, "Completion for unknown job");
                false
            }
        }
    }

    /// The launch failed; the job becomes eligible again on the next tick.
    pub fn on_error(&mut self, job_id: JobId) -> bool {
        match self.get_job_mut(job_id) {
            Some(job) if job.state == JobState::Active => {
                job.try_transition(JobState::Pending);
                job.pid = None;
                tracing::warn!(job_id = %job_id, "Job failed, returning it to the queue");
                true
            }
            Some(job) => {
                tracing::debug!(job_id = %job_id, state = %job.state, "Ignoring failure");
                false
            }
            None => {
                tracing::debug!(job_id = %job_id, "Failure for unknown job");
                false
            }
        }
    }
}

/// Clamps a configured watermark into `[0, 100]`.
pub fn clamp_watermark(watermark: i64) -> u8 {
    watermark.clamp(0, i64::from(MAX_WATERMARK)) as u8
}

/// Builder for creating Scheduler instances with dependency injection
pub struct SchedulerBuilder {
    max_queue_size: usize,
    default_watermark: u8,
    policy: Box<dyn SelectionPolicy>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            max_queue_size: 10,
            default_watermark: 10,
            policy: Box::new(EarliestSubmitted),
        }
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_default_watermark(mut self, watermark: i64) -> Self {
        self.default_watermark = clamp_watermark(watermark);
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn SelectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Scheduler {
        Scheduler {
            jobs: Vec::new(),
            max_queue_size: self.max_queue_size,
            default_watermark: self.default_watermark,
            policy: self.policy,
        }
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
