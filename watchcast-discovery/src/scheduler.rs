use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use watchcast_core::model::VideoId;

use crate::probe::ChannelProbe;

/// Fans a tick's channel URLs out across a bounded concurrency, in chunks,
/// with a short pause between chunks to spread load. Per-probe failures are
/// already isolated inside [`ChannelProbe::probe`]; this never fails the tick.
pub struct FanOutScheduler {
    probe: Arc<ChannelProbe>,
    chunk_size: usize,
    concurrency: usize,
    inter_chunk_pause: Duration,
}

impl FanOutScheduler {
    #[must_use]
    pub fn new(probe: Arc<ChannelProbe>, chunk_size: usize, concurrency: usize) -> Self {
        Self {
            probe,
            chunk_size: chunk_size.max(1),
            concurrency: concurrency.max(1),
            inter_chunk_pause: Duration::from_millis(500),
        }
    }

    pub async fn run(&self, urls: &[String]) -> HashSet<VideoId> {
        let mut union = HashSet::new();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));

        for (i, chunk) in urls.chunks(self.chunk_size).enumerate() {
            if i > 0 {
                tokio::time::sleep(self.inter_chunk_pause).await;
            }

            let mut handles = Vec::with_capacity(chunk.len());
            for url in chunk {
                let permit = semaphore.clone();
                let probe = self.probe.clone();
                let url = url.clone();
                handles.push(tokio::spawn(async move {
                    let _permit = permit.acquire_owned().await.ok();
                    probe.probe(&url).await
                }));
            }

            for handle in handles {
                match handle.await {
                    Ok(ids) => union.extend(ids),
                    Err(err) => tracing::warn!(error = %err, "probe task panicked"),
                }
            }
        }

        union
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_url_list_yields_empty_set() {
        let probe = Arc::new(ChannelProbe::new(
            "yt-dlp".to_string(),
            vec!["www.youtube.com".to_string()],
        ));
        let scheduler = FanOutScheduler::new(probe, 3, 5);
        let result = scheduler.run(&[]).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn disallowed_hosts_never_poison_the_run() {
        let probe = Arc::new(ChannelProbe::new(
            "yt-dlp".to_string(),
            vec!["www.youtube.com".to_string()],
        ));
        let scheduler = FanOutScheduler::new(probe, 2, 2);
        let urls = vec![
            "https://evil.example.com/a".to_string(),
            "https://evil.example.com/b".to_string(),
            "https://evil.example.com/c".to_string(),
        ];
        let result = scheduler.run(&urls).await;
        assert!(result.is_empty());
    }
}
