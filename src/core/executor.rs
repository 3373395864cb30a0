use crate::core::job::Job;
use crate::core::JobId;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::oneshot;

/// How a launch ended, as reported by the launcher task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The process never started: missing binary, bad working directory,
    /// unwritable log file and so on.
    StartFailed { reason: String },
    /// The process ran to completion. `code` is `None` when a signal ended it.
    Exited { code: Option<i32> },
}

/// Returned by [`Executor::launch`]. The outcome channel carries exactly one
/// value, sent when the process exits or immediately on start failure.
#[derive(Debug)]
pub struct LaunchHandle {
    pub job_id: JobId,
    pub pid: Option<u32>,
    pub outcome: oneshot::Receiver<LaunchOutcome>,
}

impl LaunchHandle {
    /// Handle for a launch that failed before a process existed.
    pub fn start_failed(job_id: JobId, reason: impl Into<String>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(LaunchOutcome::StartFailed {
            reason: reason.into(),
        });
        Self {
            job_id,
            pid: None,
            outcome: rx,
        }
    }
}

pub trait Executor: Send + Sync {
    /// Starts `job` and returns without waiting for it to finish.
    fn launch(&self, job: &Job) -> LaunchHandle;

    /// Asks a running process to stop.
    fn terminate(&self, pid: u32) -> anyhow::Result<()>;
}

/// Where the line between success and failure of a finished process lies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ExitPolicy {
    /// Any exit counts as success, whatever the exit code or signal.
    #[default]
    AnyExit,
    /// Only exit status 0 counts as success. Failures are requeued.
    ZeroExit,
}

impl ExitPolicy {
    pub fn is_success(self, outcome: &LaunchOutcome) -> bool {
        match (self, outcome) {
            (_, LaunchOutcome::StartFailed { .. }) => false,
            (ExitPolicy::AnyExit, LaunchOutcome::Exited { .. }) => true,
            (ExitPolicy::ZeroExit, LaunchOutcome::Exited { code }) => *code == Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_exit_treats_every_exit_as_success() {
        let policy = ExitPolicy::AnyExit;
        assert!(policy.is_success(&LaunchOutcome::Exited { code: Some(0) }));
        assert!(policy.is_success(&LaunchOutcome::Exited { code: Some(1) }));
        assert!(policy.is_success(&LaunchOutcome::Exited { code: None }));
        assert!(!policy.is_success(&LaunchOutcome::StartFailed {
            reason: "No such file or directory".into()
        }));
    }

    #[test]
    fn test_zero_exit_requires_clean_status() {
        let policy = ExitPolicy::ZeroExit;
        assert!(policy.is_success(&LaunchOutcome::Exited { code: Some(0) }));
        assert!(!policy.is_success(&LaunchOutcome::Exited { code: Some(2) }));
        assert!(!policy.is_success(&LaunchOutcome::Exited { code: None }));
        assert!(!policy.is_success(&LaunchOutcome::StartFailed {
            reason: "permission denied".into()
        }));
    }

    #[test]
    fn test_exit_policy_names() {
        assert_eq!("zero-exit".parse::<ExitPolicy>().unwrap(), ExitPolicy::ZeroExit);
        assert_eq!(ExitPolicy::default().to_string(), "any-exit");
    }

    #[tokio::test]
    async fn test_start_failed_handle_is_ready() {
        let id = uuid::Uuid::new_v4();
        let handle = LaunchHandle::start_failed(id, "boom");
        assert_eq!(handle.job_id, id);
        assert_eq!(handle.pid, None);
        assert_eq!(
            handle.outcome.await.unwrap(),
            LaunchOutcome::StartFailed {
                reason: "boom".into()
            }
        );
    }
}
