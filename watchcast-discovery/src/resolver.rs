use watchcast_core::classify::classify;
use watchcast_core::model::{BroadcastState, VideoMetadataRecord};

use crate::error::{Error, Result};

/// Fetches a video's metadata and classifies its broadcast state.
pub struct VideoMetadataResolver {
    binary: String,
}

impl VideoMetadataResolver {
    #[must_use]
    pub fn new(binary: String) -> Self {
        Self { binary }
    }

    pub async fn resolve(&self, video_url: &str, now: i64) -> Result<(VideoMetadataRecord, BroadcastState)> {
        let record = self.fetch_metadata(video_url).await?;
        let state = classify(&record, now);
        Ok((record, state))
    }

    async fn fetch_metadata(&self, video_url: &str) -> Result<VideoMetadataRecord> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["--dump-json", "--no-warnings", video_url])
            .output()
            .await
            .map_err(|e| Error::Spawn("discovery", e))?;

        if !output.status.success() {
            return Err(Error::NonZeroExit("discovery", output.status));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let record: VideoMetadataRecord = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::MetadataParse("discovery", e))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_yields_error() {
        let resolver = VideoMetadataResolver::new("definitely-not-a-real-binary".to_string());
        let result = resolver.resolve("https://www.youtube.com/watch?v=abc", 1000).await;
        assert!(result.is_err());
    }
}
