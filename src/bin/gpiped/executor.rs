use anyhow::{Context, Result};
use gpupipe::core::executor::{Executor, LaunchHandle, LaunchOutcome};
use gpupipe::core::job::Job;
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

/// Runs jobs as direct child processes of the daemon.
pub struct ProcessExecutor;

fn log_sink(path: Option<&Path>) -> Result<Stdio> {
    let Some(path) = path else {
        return Ok(Stdio::null());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .mode(0o644)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(Stdio::from(file))
}

impl ProcessExecutor {
    fn spawn(&self, job: &Job) -> Result<Child> {
        let (program, args) = job
            .command
            .split_first()
            .context("Job has an empty command")?;
        let stdout = log_sink(job.log_path.as_deref())?;
        let stderr = log_sink(job.err_log_path.as_deref())?;

        Command::new(program)
            .args(args)
            .current_dir(&job.run_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start '{}' in {}", program, job.run_dir.display()))
    }
}

impl Executor for ProcessExecutor {
    fn launch(&self, job: &Job) -> LaunchHandle {
        let mut child = match self.spawn(job) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(job_id = %job.id, "{e:#}");
                return LaunchHandle::start_failed(job.id, format!("{e:#}"));
            }
        };

        let pid = child.id();
        let job_id = job.id;
        tracing::info!(job_id = %job_id, pid = ?pid, command = %job.command_line(), "Process started");

        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let outcome = match child.wait().await {
                Ok(status) => LaunchOutcome::Exited {
                    code: status.code(),
                },
                Err(e) => {
                    tracing::error!(job_id = %job_id, "Failed to wait for process: {e}");
                    LaunchOutcome::Exited { code: None }
                }
            };
            tracing::info!(job_id = %job_id, pid = ?pid, ?outcome, "Process exited");
            let _ = tx.send(outcome);
        });

        LaunchHandle {
            job_id,
            pid,
            outcome: rx,
        }
    }

    fn terminate(&self, pid: u32) -> Result<()> {
        if pid == 0 {
            anyhow::bail!("Refusing to signal pid 0");
        }
        let pid = libc::pid_t::try_from(pid).context("Pid out of range")?;

        // SAFETY: kill(2) has no memory-safety preconditions.
        let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
        if ret != 0 {
            return Err(std::io::Error::last_os_error())
                .with_context(|| format!("Failed to send SIGTERM to pid {pid}"));
        }
        tracing::info!(pid, "Sent SIGTERM");
        Ok(())
    }
}
