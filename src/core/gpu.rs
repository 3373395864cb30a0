use anyhow::Context;
use nvml_wrapper::Nvml;
use serde::{Deserialize, Serialize};

/// One device as seen by a single sample. Replaced wholesale every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuSnapshot {
    pub index: u32,
    pub uuid: String,
    pub name: String,
    pub memory_total_mb: u64,
    pub memory_used_mb: u64,
    pub memory_free_mb: u64,
    pub gpu_utilization: u32,
    /// Used device memory in percent, rounded up.
    pub memory_used_percent: u8,
}

impl GpuSnapshot {
    pub fn from_memory(
        index: u32,
        uuid: String,
        name: String,
        total_bytes: u64,
        used_bytes: u64,
        free_bytes: u64,
        gpu_utilization: u32,
    ) -> Self {
        Self {
            index,
            uuid,
            name,
            memory_total_mb: total_bytes / MB,
            memory_used_mb: used_bytes / MB,
            memory_free_mb: free_bytes / MB,
            gpu_utilization,
            memory_used_percent: used_percent(used_bytes, total_bytes),
        }
    }

    /// Synthetic device with a 100 MB memory pool, `used` of it taken.
    pub fn with_usage(index: u32, used: u8) -> Self {
        let used = used.min(100);
        Self {
            index,
            uuid: format!("GPU-{index:08}"),
            name: "Synthetic GPU".to_string(),
            memory_total_mb: 100,
            memory_used_mb: u64::from(used),
            memory_free_mb: 100 - u64::from(used),
            gpu_utilization: 0,
            memory_used_percent: used,
        }
    }
}

const MB: u64 = 1024 * 1024;

fn used_percent(used: u64, total: u64) -> u8 {
    if total == 0 {
        // Nothing known about the pool; never treat it as free.
        return 100;
    }
    let percent = (u128::from(used) * 100).div_ceil(u128::from(total));
    percent.min(100) as u8
}

/// Produces a point-in-time view of every visible device.
#[cfg_attr(test, mockall::automock)]
pub trait GpuSnapshotSource: Send + Sync {
    fn snapshot(&self) -> anyhow::Result<Vec<GpuSnapshot>>;
}

/// Samples devices through NVML.
pub struct NvmlSnapshotSource {
    nvml: Nvml,
}

impl NvmlSnapshotSource {
    pub fn init() -> anyhow::Result<Self> {
        let nvml = Nvml::init().context("Failed to initialize NVML")?;
        Ok(Self { nvml })
    }
}

impl GpuSnapshotSource for NvmlSnapshotSource {
    fn snapshot(&self) -> anyhow::Result<Vec<GpuSnapshot>> {
        let count = self
            .nvml
            .device_count()
            .context("Failed to query device count")?;

        let mut gpus = Vec::with_capacity(count as usize);
        for index in 0..count {
            let device = self
                .nvml
                .device_by_index(index)
                .with_context(|| format!("Failed to open GPU {index}"))?;
            let memory = device
                .memory_info()
                .with_context(|| format!("Failed to read memory info of GPU {index}"))?;
            let uuid = device.uuid().unwrap_or_default();
            let name = device.name().unwrap_or_default();
            let gpu_utilization = device.utilization_rates().map(|u| u.gpu).unwrap_or(0);

            gpus.push(GpuSnapshot::from_memory(
                index,
                uuid,
                name,
                memory.total,
                memory.used,
                memory.free,
                gpu_utilization,
            ));
        }
        Ok(gpus)
    }
}

/// Stand-in for hosts without NVML: always reports zero devices, so only
/// jobs without GPU requirements are admitted.
pub struct NoGpuSource;

impl GpuSnapshotSource for NoGpuSource {
    fn snapshot(&self) -> anyhow::Result<Vec<GpuSnapshot>> {
        Ok(Vec::new())
    }
}

/// Picks NVML when it loads and falls back to [`NoGpuSource`] otherwise.
pub fn detect_source() -> Box<dyn GpuSnapshotSource> {
    match NvmlSnapshotSource::init() {
        Ok(source) => Box::new(source),
        Err(e) => {
            tracing::warn!("{e:#}. Running without GPU support.");
            Box::new(NoGpuSource)
        }
    }
}
