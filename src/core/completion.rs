use crate::core::executor::{ExitPolicy, LaunchHandle, LaunchOutcome};
use crate::core::JobId;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinSet};

/// Receives the verdict for every registered launch, exactly once per launch.
pub trait CompletionHandler: Send + Sync + 'static {
    fn on_success(&self, job_id: JobId) -> impl Future<Output = ()> + Send;

    fn on_error(&self, job_id: JobId) -> impl Future<Output = ()> + Send;
}

type Registration = (JobId, oneshot::Receiver<LaunchOutcome>);

/// Cloneable handle used by the tick loop to hand launches to the multiplexer.
#[derive(Clone)]
pub struct CompletionRegistry {
    tx: mpsc::UnboundedSender<Registration>,
}

impl CompletionRegistry {
    /// Returns `false` if the multiplexer is no longer running.
    pub fn register(&self, handle: LaunchHandle) -> bool {
        self.tx.send((handle.job_id, handle.outcome)).is_ok()
    }
}

/// Waits on the outcome channels of all in-flight launches and routes each
/// one to [`CompletionHandler::on_success`] or [`CompletionHandler::on_error`]
/// as soon as it resolves.
pub struct CompletionMultiplexer<H> {
    handler: H,
    policy: ExitPolicy,
    registrations: mpsc::UnboundedReceiver<Registration>,
    in_flight: JoinSet<(JobId, Result<LaunchOutcome, oneshot::error::RecvError>)>,
}

impl<H: CompletionHandler> CompletionMultiplexer<H> {
    pub fn new(handler: H, policy: ExitPolicy) -> (Self, CompletionRegistry) {
        let (tx, registrations) = mpsc::unbounded_channel();
        let multiplexer = Self {
            handler,
            policy,
            registrations,
            in_flight: JoinSet::new(),
        };
        (multiplexer, CompletionRegistry { tx })
    }

    /// Runs until every [`CompletionRegistry`] is dropped and all in-flight
    /// launches have reported.
    pub async fn run(mut self) {
        loop {
            let joined = tokio::select! {
                registration = self.registrations.recv() => {
                    match registration {
                        Some((job_id, outcome)) => {
                            self.in_flight.spawn(async move { (job_id, outcome.await) });
                            continue;
                        }
                        None => break,
                    }
                }
                Some(joined) = self.in_flight.join_next() => joined,
            };
            self.dispatch(joined).await;
        }

        while let Some(joined) = self.in_flight.join_next().await {
            self.dispatch(joined).await;
        }
        tracing::debug!("Completion multiplexer stopped");
    }

    async fn dispatch(
        &self,
        joined: Result<(JobId, Result<LaunchOutcome, oneshot::error::RecvError>), JoinError>,
    ) {
        let (job_id, received) = match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Completion waiter failed: {e}");
                return;
            }
        };

        // A launcher that goes away without reporting never produced a usable run.
        let outcome = received.unwrap_or_else(|_| LaunchOutcome::StartFailed {
            reason: "launcher dropped the outcome channel".to_string(),
        });

        if self.policy.is_success(&outcome) {
            tracing::debug!(job_id = %job_id, ?outcome, "Launch completed");
            self.handler.on_success(job_id).await;
        } else {
            tracing::warn!(job_id = %job_id, ?outcome, "Launch failed");
            self.handler.on_error(job_id).await;
        }
    }
}
