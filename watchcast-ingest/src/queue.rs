use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use watchcast_core::model::{PipelineJob, PipelineOutcome};
use watchcast_pipeline::PipelineSupervisor;

use crate::status_client::IngestStatusClient;

const BUSY_RECHECK_SECS: u64 = 30;

/// Single-consumer FIFO of pending pipeline jobs. At most one drain task runs
/// at a time per queue, guarded by `drain_running` rather than by convention:
/// a burst of concurrent `add` calls around drain-exit cannot spawn two
/// drains, since only the caller that wins the compare-exchange spawns one.
pub struct IngestQueue {
    sender: mpsc::UnboundedSender<PipelineJob>,
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<PipelineJob>>>,
    drain_running: Arc<AtomicBool>,
    drain_handle: Arc<StdMutex<Option<JoinHandle<()>>>>,
    status: Arc<IngestStatusClient>,
    supervisor: Arc<PipelineSupervisor>,
    cancel: watch::Receiver<bool>,
}

impl IngestQueue {
    #[must_use]
    pub fn new(
        status: Arc<IngestStatusClient>,
        supervisor: Arc<PipelineSupervisor>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            drain_running: Arc::new(AtomicBool::new(false)),
            drain_handle: Arc::new(StdMutex::new(None)),
            status,
            supervisor,
            cancel,
        }
    }

    /// Appends a job and starts the drain task if one is not already running.
    pub fn add(&self, job: PipelineJob) {
        let _ = self.sender.send(job);
        self.maybe_spawn_drain();
    }

    /// Waits for the current drain task, if any, to finish its in-flight job
    /// and go idle. Call after signaling cancellation so callers don't return
    /// (and let the runtime drop) while a pipeline's grace-period shutdown is
    /// still in progress.
    pub async fn join(&self) {
        let handle = self.drain_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    fn maybe_spawn_drain(&self) {
        if self
            .drain_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let receiver = self.receiver.clone();
        let drain_running = self.drain_running.clone();
        let status = self.status.clone();
        let supervisor = self.supervisor.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            drain(receiver, drain_running, status, supervisor, cancel).await;
        });
        *self.drain_handle.lock().unwrap() = Some(handle);
    }
}

async fn drain(
    receiver: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<PipelineJob>>>,
    drain_running: Arc<AtomicBool>,
    status: Arc<IngestStatusClient>,
    supervisor: Arc<PipelineSupervisor>,
    cancel: watch::Receiver<bool>,
) {
    loop {
        if status.is_ingesting().await {
            tokio::time::sleep(Duration::from_secs(BUSY_RECHECK_SECS)).await;
            continue;
        }

        let job = {
            let mut receiver = receiver.lock().await;
            receiver.try_recv().ok()
        };

        let job = match job {
            Some(job) => job,
            None => {
                // Flip the flag first so a racing `add()` is free to spawn a
                // fresh drain, then re-check the channel once more: a job
                // that lands in the window between our `try_recv` above and
                // this store would otherwise sit unclaimed, since that
                // `add()`'s compare-exchange would have seen the flag still
                // `true` and assumed we'd pick it up.
                drain_running.store(false, Ordering::Release);
                match receiver.lock().await.try_recv().ok() {
                    None => return,
                    Some(job) => {
                        // Try to reclaim ownership. If a concurrent `add()`
                        // already won it, that task's drain loop is now
                        // live; we just finish this one job under our own
                        // steam and stop, without touching the flag again.
                        let reclaimed = drain_running
                            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                            .is_ok();
                        process_job(&supervisor, &job, cancel.clone()).await;
                        if !reclaimed {
                            return;
                        }
                        continue;
                    }
                }
            }
        };

        process_job(&supervisor, &job, cancel.clone()).await;
    }
}

async fn process_job(supervisor: &PipelineSupervisor, job: &PipelineJob, cancel: watch::Receiver<bool>) {
    match run_job(supervisor, job, cancel).await {
        Ok(outcome) if outcome.success() => {
            tracing::info!(video_url = %job.video_url, "pipeline job succeeded");
        }
        Ok(outcome) => {
            tracing::warn!(video_url = %job.video_url, ?outcome, "pipeline job failed after retries");
        }
        Err(err) => {
            tracing::warn!(video_url = %job.video_url, error = %err, "pipeline job errored");
            tokio::time::sleep(Duration::from_secs(BUSY_RECHECK_SECS)).await;
        }
    }
}

async fn run_job(
    supervisor: &PipelineSupervisor,
    job: &PipelineJob,
    cancel: watch::Receiver<bool>,
) -> watchcast_pipeline::Result<PipelineOutcome> {
    supervisor.run(job, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration as StdDuration;

    fn test_job() -> PipelineJob {
        PipelineJob {
            video_url: "https://www.youtube.com/watch?v=abc".to_string(),
            rtmp_url: "/live/test".to_string(),
        }
    }

    fn test_queue() -> IngestQueue {
        let dir = tempfile::tempdir().unwrap();
        let status = Arc::new(
            IngestStatusClient::new(
                "http://localhost:1".to_string(),
                "u".to_string(),
                "p".to_string(),
                1,
                dir.path(),
                true,
            )
            .unwrap(),
        );
        let supervisor = Arc::new(PipelineSupervisor::new(
            "definitely-not-real".to_string(),
            "also-not-real".to_string(),
            0,
            StdDuration::from_secs(1),
        ));
        let (_tx, rx) = watch::channel(false);
        IngestQueue::new(status, supervisor, rx)
    }

    #[tokio::test]
    async fn empty_queue_never_spawns_a_drain() {
        let queue = test_queue();
        assert!(!queue.drain_running.load(Ordering::Acquire));
        let _ = test_job();
    }

    #[tokio::test]
    async fn join_on_an_idle_queue_returns_immediately() {
        let queue = test_queue();
        queue.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn add_spawns_a_drain_and_join_waits_for_it() {
        let queue = test_queue();
        queue.add(test_job());
        assert!(queue.drain_running.load(Ordering::Acquire));
        queue.join().await;
        assert!(!queue.drain_running.load(Ordering::Acquire));
    }
}
