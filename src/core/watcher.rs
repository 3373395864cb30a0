use crate::core::gpu::{GpuSnapshot, GpuSnapshotSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Samples `source` every `interval` and forwards each snapshot to the tick loop.
///
/// The first sample is taken immediately. A failed sample is logged and
/// skipped. Returns once the receiving side is dropped.
pub async fn run(
    interval: Duration,
    source: Arc<dyn GpuSnapshotSource>,
    tx: mpsc::Sender<Vec<GpuSnapshot>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tx.closed() => break,
        }

        let sampler = Arc::clone(&source);
        let sample = match tokio::task::spawn_blocking(move || sampler.snapshot()).await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::error!("GPU sampling task panicked: {e}");
                continue;
            }
        };

        let snapshot = match sample {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Failed to sample GPUs: {e:#}");
                continue;
            }
        };

        tracing::trace!(gpus = snapshot.len(), "GPU snapshot taken");
        if tx.send(snapshot).await.is_err() {
            break;
        }
    }

    tracing::debug!("GPU watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gpu::MockGpuSnapshotSource;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_forwards_snapshots() {
        let mut source = MockGpuSnapshotSource::new();
        source
            .expect_snapshot()
            .returning(|| Ok(vec![GpuSnapshot::with_usage(0, 5)]));

        let (tx, mut rx) = mpsc::channel(1);
        let watcher = tokio::spawn(run(Duration::from_millis(5), Arc::new(source), tx));

        for _ in 0..3 {
            let snapshot = rx.recv().await.unwrap();
            assert_eq!(snapshot, vec![GpuSnapshot::with_usage(0, 5)]);
        }

        drop(rx);
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn test_skips_failed_samples() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut source = MockGpuSnapshotSource::new();
        source.expect_snapshot().returning(move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                anyhow::bail!("NVML went away")
            }
            Ok(vec![GpuSnapshot::with_usage(1, 50)])
        });

        let (tx, mut rx) = mpsc::channel(1);
        let watcher = tokio::spawn(run(Duration::from_millis(5), Arc::new(source), tx));

        let snapshot = rx.recv().await.unwrap();
        assert_eq!(snapshot[0].index, 1);
        assert!(calls.load(Ordering::SeqCst) >= 2);

        drop(rx);
        watcher.await.unwrap();
    }
}
