use crate::core::gpu::GpuSnapshot;
use crate::core::JobId;
use serde::{Deserialize, Serialize};

/// Reply to a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: JobId,
}

/// Body of every non-2xx reply from the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerInfo {
    /// Most recent snapshot seen by the tick loop.
    pub gpus: Vec<GpuSnapshot>,
    pub queue_len: usize,
    pub max_queue_size: usize,
    pub default_watermark: u8,
    pub policy: String,
    pub exit_policy: String,
}
