use crate::core::gpu::GpuSnapshot;
use crate::core::JobId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use strum::{Display, EnumIter, EnumString};

/// Highest watermark a device can be held to, in percent.
pub const MAX_WATERMARK: u8 = 100;

#[derive(
    Debug,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    Hash,
    Display,
    EnumIter,
    EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum JobState {
    /// Waiting to be evaluated on the next tick.
    Pending,
    /// Passed the availability scan of the current tick, not launched yet.
    Ready,
    /// Launch dispatched; the process is starting or running.
    Active,
    /// Terminal. The process completed or was terminated.
    Finished,
}

impl JobState {
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Pending, Ready)
                | (Ready, Pending)
                | (Ready, Active)
                | (Active, Pending)
                | (Active, Finished)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == JobState::Finished
    }
}

/// What a client submits. Everything here is immutable once the job exists.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Default)]
pub struct JobSpec {
    pub run_dir: PathBuf,
    /// Program followed by its arguments.
    pub command: Vec<String>,
    #[serde(default)]
    pub gpu_ids: Vec<u32>,
    /// Per-job watermark in percent; falls back to the scheduler default.
    #[serde(default)]
    pub memory_watermark: Option<u8>,
    #[serde(default)]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub err_log_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub run_dir: PathBuf,
    pub command: Vec<String>,
    pub gpu_ids: Vec<u32>,
    pub memory_watermark: Option<u8>,
    pub log_path: Option<PathBuf>,
    pub err_log_path: Option<PathBuf>,
    pub submitted_at: SystemTime,

    /// Fields owned by the scheduler
    pub state: JobState,
    pub pid: Option<u32>,
}

impl Job {
    pub fn from_spec(spec: JobSpec, submitted_at: SystemTime) -> Self {
        let JobSpec {
            run_dir,
            command,
            mut gpu_ids,
            memory_watermark,
            log_path,
            err_log_path,
        } = spec;
        gpu_ids.sort_unstable();
        gpu_ids.dedup();

        Self {
            id: uuid::Uuid::new_v4(),
            run_dir,
            command,
            gpu_ids,
            memory_watermark: memory_watermark.map(|w| w.min(MAX_WATERMARK)),
            log_path,
            err_log_path,
            submitted_at,
            state: JobState::Pending,
            pid: None,
        }
    }

    pub fn builder() -> JobBuilder {
        JobBuilder::new()
    }

    /// The submission this job was created from.
    pub fn spec(&self) -> JobSpec {
        JobSpec {
            run_dir: self.run_dir.clone(),
            command: self.command.clone(),
            gpu_ids: self.gpu_ids.clone(),
            memory_watermark: self.memory_watermark,
            log_path: self.log_path.clone(),
            err_log_path: self.err_log_path.clone(),
        }
    }

    pub fn effective_watermark(&self, default_watermark: u8) -> u8 {
        self.memory_watermark
            .unwrap_or(default_watermark)
            .min(MAX_WATERMARK)
    }

    /// Every required device must appear in `snapshot` with memory usage at or
    /// below the effective watermark. A job without GPU requirements always fits.
    pub fn fits(&self, snapshot: &[GpuSnapshot], default_watermark: u8) -> bool {
        let watermark = self.effective_watermark(default_watermark);
        self.gpu_ids.iter().all(|&index| {
            match snapshot.iter().find(|gpu| gpu.index == index) {
                Some(gpu) if gpu.memory_used_percent <= watermark => true,
                Some(gpu) => {
                    tracing::debug!(
                        job_id = %self.id,
                        gpu = index,
                        used = gpu.memory_used_percent,
                        watermark,
                        "GPU is above watermark"
                    );
                    false
                }
                None => {
                    tracing::debug!(job_id = %self.id, gpu = index, "GPU missing from snapshot");
                    false
                }
            }
        })
    }

    /// Moves to `next` if the state machine allows it.
    pub fn try_transition(&mut self, next: JobState) -> bool {
        if self.state.can_transition_to(next) {
            tracing::trace!(job_id = %self.id, from = %self.state, to = %next, "Job transition");
            self.state = next;
            true
        } else {
            tracing::debug!(
                job_id = %self.id,
                from = %self.state,
                to = %next,
                "Ignoring invalid job transition"
            );
            false
        }
    }

    /// Program and arguments joined into one shell-safe line.
    pub fn command_line(&self) -> String {
        crate::utils::join_command(&self.command)
    }
}

#[derive(Default)]
pub struct JobBuilder {
    spec: JobSpec,
}

impl JobBuilder {
    pub fn new() -> Self {
        Self {
            spec: JobSpec {
                run_dir: PathBuf::from("."),
                ..Default::default()
            },
        }
    }

    pub fn run_dir(mut self, run_dir: impl Into<PathBuf>) -> Self {
        self.spec.run_dir = run_dir.into();
        self
    }

    pub fn command<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spec.command = argv.into_iter().map(Into::into).collect();
        self
    }

    pub fn gpu_ids(mut self, gpu_ids: impl Into<Vec<u32>>) -> Self {
        self.spec.gpu_ids = gpu_ids.into();
        self
    }

    pub fn memory_watermark(mut self, watermark: Option<u8>) -> Self {
        self.spec.memory_watermark = watermark;
        self
    }

    pub fn log_path(mut self, path: Option<PathBuf>) -> Self {
        self.spec.log_path = path;
        self
    }

    pub fn err_log_path(mut self, path: Option<PathBuf>) -> Self {
        self.spec.err_log_path = path;
        self
    }

    pub fn build(self) -> JobSpec {
        self.spec
    }
}
