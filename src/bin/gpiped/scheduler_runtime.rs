use gpupipe::core::completion::{CompletionHandler, CompletionRegistry};
use gpupipe::core::executor::{ExitPolicy, Executor};
use gpupipe::core::gpu::GpuSnapshot;
use gpupipe::core::info::SchedulerInfo;
use gpupipe::core::job::{Job, JobSpec, JobState};
use gpupipe::core::scheduler::{Scheduler, SchedulerError};
use gpupipe::core::JobId;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub type SharedState = Arc<RwLock<SchedulerRuntime>>;

/// Runtime adapter that pairs the scheduler with the process executor
pub struct SchedulerRuntime {
    scheduler: Scheduler,
    executor: Arc<dyn Executor>, // Shared executor so launches happen without the lock
    exit_policy: ExitPolicy,
    last_snapshot: Vec<GpuSnapshot>,
    shutting_down: bool, // Set by terminate_all; no launches afterwards
}

impl SchedulerRuntime {
    pub fn new(scheduler: Scheduler, executor: Arc<dyn Executor>, exit_policy: ExitPolicy) -> Self {
        Self {
            scheduler,
            executor,
            exit_policy,
            last_snapshot: Vec::new(),
            shutting_down: false,
        }
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(RwLock::new(self))
    }

    pub fn submit_job(&mut self, spec: JobSpec) -> Result<JobId, SchedulerError> {
        self.scheduler.submit(spec)
    }

    pub fn jobs(&self) -> &[Job] {
        self.scheduler.jobs()
    }

    pub fn get_job(&self, job_id: JobId) -> Option<&Job> {
        self.scheduler.get_job(job_id)
    }

    /// Removes the job and stops its process if it has one. Returns `false` for an unknown id.
    pub fn delete_job(&mut self, job_id: JobId) -> bool {
        let Some(deleted) = self.scheduler.delete(job_id) else {
            return false;
        };
        if deleted.was_active {
            if let Some(pid) = deleted.job.pid {
                self.terminate_process(job_id, pid);
            }
        }
        true
    }

    /// Stops every running job and disables further launches. Used on daemon shutdown.
    pub fn terminate_all(&mut self) -> usize {
        self.shutting_down = true;
        let terminated = self.scheduler.terminate_all();
        for job in &terminated {
            if let Some(pid) = job.pid {
                self.terminate_process(job.id, pid);
            }
        }
        tracing::info!("Terminated {} active job(s)", terminated.len());
        terminated.len()
    }

    fn terminate_process(&self, job_id: JobId, pid: u32) {
        if let Err(e) = self.executor.terminate(pid) {
            tracing::warn!(job_id = %job_id, pid, "{e:#}");
        }
    }

    pub fn info(&self) -> SchedulerInfo {
        SchedulerInfo {
            gpus: self.last_snapshot.clone(),
            queue_len: self.scheduler.len(),
            max_queue_size: self.scheduler.max_queue_size(),
            default_watermark: self.scheduler.default_watermark(),
            policy: self.scheduler.policy_name().to_string(),
            exit_policy: self.exit_policy.to_string(),
        }
    }
}

/// Routes completion verdicts back into the shared scheduler state.
pub struct StateCallbacks(pub SharedState);

impl CompletionHandler for StateCallbacks {
    async fn on_success(&self, job_id: JobId) {
        self.0.write().await.scheduler.on_success(job_id);
    }

    async fn on_error(&self, job_id: JobId) {
        self.0.write().await.scheduler.on_error(job_id);
    }
}

/// Drives one tick per snapshot until the watcher stops.
pub async fn run(
    shared_state: SharedState,
    mut snapshots: mpsc::Receiver<Vec<GpuSnapshot>>,
    completions: CompletionRegistry,
) {
    while let Some(snapshot) = snapshots.recv().await {
        tick(&shared_state, snapshot, &completions).await;
    }
    tracing::info!("Scheduler loop stopped");
}

/// Admits at most one job. Returns the id of the launched job, if any.
pub async fn tick(
    shared_state: &SharedState,
    snapshot: Vec<GpuSnapshot>,
    completions: &CompletionRegistry,
) -> Option<JobId> {
    // Step 1: Scan and mark the selected job Active (write lock - fast, no I/O)
    let (job, executor) = {
        let mut state = shared_state.write().await;
        if state.shutting_down {
            return None;
        }
        let selected = state.scheduler.schedule(&snapshot);
        state.last_snapshot = snapshot;
        (selected?, Arc::clone(&state.executor))
    }; // Lock released here

    // Step 2: Re-check and launch without holding the lock. A delete may have
    // landed in between.
    let still_active = {
        let state = shared_state.read().await;
        !state.shutting_down
            && state
                .get_job(job.id)
                .is_some_and(|j| j.state == JobState::Active)
    };
    if !still_active {
        tracing::debug!(job_id = %job.id, "Job left the registry before launch");
        return None;
    }

    let handle = executor.launch(&job);

    // Step 3: Record the pid (write lock - brief)
    if let Some(pid) = handle.pid {
        let recorded = shared_state.write().await.scheduler.record_pid(job.id, pid);
        if !recorded {
            tracing::warn!(job_id = %job.id, pid, "Job was deleted during launch, terminating it");
            if let Err(e) = executor.terminate(pid) {
                tracing::warn!(job_id = %job.id, pid, "{e:#}");
            }
        }
    }

    if !completions.register(handle) {
        tracing::error!(job_id = %job.id, "Completion multiplexer is not running");
    }
    Some(job.id)
}
