pub mod completion;
pub mod executor;
pub mod gpu;
pub mod info;
pub mod job;
pub mod policy;
pub mod scheduler;
pub mod watcher;

use std::path::PathBuf;

/// Opaque job identifier handed out by the scheduler at submission.
pub type JobId = uuid::Uuid;

pub fn version() -> &'static str {
    let version = format!(
        "{} ({})\nBranch: {}\nCommit: {}\nAuthors: {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        option_env!("VERGEN_GIT_BRANCH").unwrap_or("unknown"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        clap::crate_authors!(),
    );
    Box::leak(version.into_boxed_str())
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get config directory"))
        .map(|p| p.join("gpupipe"))
}

pub fn get_data_dir() -> anyhow::Result<PathBuf> {
    dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("Failed to get data directory"))
        .map(|p| p.join("gpupipe"))
}

pub fn get_daemon_log_dir() -> anyhow::Result<PathBuf> {
    Ok(get_data_dir()?.join("logs"))
}
