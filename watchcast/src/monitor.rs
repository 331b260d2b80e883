use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;

use watchcast_core::model::{BroadcastState, ChannelRef, PipelineJob};
use watchcast_core::store::ChannelStore;
use watchcast_discovery::{FanOutScheduler, VideoMetadataResolver};
use watchcast_ingest::IngestQueue;

/// Drives the polling tick for one channel: probe, diff against the seen
/// set, classify new arrivals, dispatch ingestible ones, and persist.
pub struct MonitorService {
    channel: ChannelRef,
    store: Arc<dyn ChannelStore>,
    scheduler: Arc<FanOutScheduler>,
    resolver: Arc<VideoMetadataResolver>,
    queue: Arc<IngestQueue>,
    poll_interval: Duration,
    rtmp_path: String,
    debug: bool,
    first_tick: bool,
}

impl MonitorService {
    #[must_use]
    pub fn new(
        channel: ChannelRef,
        store: Arc<dyn ChannelStore>,
        scheduler: Arc<FanOutScheduler>,
        resolver: Arc<VideoMetadataResolver>,
        queue: Arc<IngestQueue>,
        poll_interval: Duration,
        rtmp_path: String,
        debug: bool,
    ) -> Self {
        Self {
            channel,
            store,
            scheduler,
            resolver,
            queue,
            poll_interval,
            rtmp_path,
            debug,
            first_tick: true,
        }
    }

    pub async fn run(&mut self, mut cancel: watch::Receiver<bool>) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::warn!(channel_id = self.channel.id, error = %err, "tick failed");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = cancel.changed() => {
                    // Wait for any in-flight capture's grace-period shutdown
                    // to actually finish reaping its children before handing
                    // control back to the caller, instead of returning while
                    // that work is still running on a detached task.
                    self.queue.join().await;
                    return;
                }
            }
        }
    }

    async fn tick(&mut self) -> watchcast_core::Result<()> {
        let ids_now = self.scheduler.run(&self.channel.urls).await;

        if self.first_tick {
            self.store.add_seen(&ids_now).await?;
            self.first_tick = false;
            tracing::info!(channel_id = self.channel.id, count = ids_now.len(), "seeded seen set");
            return Ok(());
        }

        let seen = self.store.load_seen().await?;
        let new_ids: std::collections::HashSet<_> = ids_now.difference(&seen).cloned().collect();
        if new_ids.is_empty() {
            return Ok(());
        }

        let now = now_secs();
        let mut pending_notified = HashMap::new();

        for video_id in &new_ids {
            let video_url = format!("https://www.youtube.com/watch?v={video_id}");
            match self.resolver.resolve(&video_url, now).await {
                Ok((record, state)) => {
                    if self.debug {
                        tracing::debug!(
                            channel_id = self.channel.id,
                            video_id,
                            ?state,
                            is_live = record.is_live,
                            was_live = record.was_live,
                            live_status = ?record.live_status,
                            release_ts = record.release_ts(),
                            duration = ?record.duration,
                            format_count = record.formats.len(),
                            "resolved video metadata"
                        );
                    }
                    self.dispatch(
                        video_id,
                        &video_url,
                        state,
                        record.release_ts(),
                        now,
                        &mut pending_notified,
                    )
                }
                Err(err) => {
                    tracing::warn!(channel_id = self.channel.id, video_id, error = %err, "metadata resolution failed");
                }
            }
        }

        self.store.add_seen(&new_ids).await?;
        if !pending_notified.is_empty() {
            self.store.add_notified(&pending_notified).await?;
        }

        Ok(())
    }

    fn dispatch(
        &self,
        video_id: &str,
        video_url: &str,
        state: BroadcastState,
        release_ts: i64,
        now: i64,
        pending_notified: &mut HashMap<String, i64>,
    ) {
        // `UpcomingScheduled` with a still-future release timestamp is seeded
        // into Seen but neither enqueued nor notified; if the clock has
        // since caught up to (or passed) the schedule, treat it as late and
        // enqueue it like any other ingestible state.
        if state == BroadcastState::UpcomingScheduled && release_ts > now {
            tracing::info!(channel_id = self.channel.id, video_id, release_ts, "scheduled for the future, not enqueuing");
            return;
        }

        self.queue.add(PipelineJob {
            video_url: video_url.to_string(),
            rtmp_url: self.rtmp_path.clone(),
        });
        pending_notified.insert(video_id.to_string(), now);
        tracing::info!(channel_id = self.channel.id, video_id, ?state, "enqueued for capture");
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
