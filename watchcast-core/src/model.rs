use serde::{Deserialize, Serialize};

/// A stable channel key plus the URLs known to alias to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: i64,
    pub urls: Vec<String>,
}

pub type VideoId = String;

/// The closed set of broadcast lifecycle positions a video can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastState {
    Live,
    UpcomingLaunched,
    UpcomingScheduled,
    UpcomingPreLaunch,
    LiveVod,
    Vod,
}

/// Narrow, defensively-populated projection of whatever metadata fields the
/// classifier needs. Any field may be absent in the upstream source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMetadataRecord {
    pub video_id: VideoId,
    pub is_live: bool,
    pub was_live: bool,
    pub live_status: LiveStatus,
    #[serde(deserialize_with = "deserialize_loose_timestamp")]
    pub release_timestamp: Option<i64>,
    pub duration: Option<f64>,
    pub formats: Vec<FormatEntry>,
}

/// Upstream sometimes emits the string `"null"` in place of a JSON null for
/// `release_timestamp`; tolerate that alongside an absent field, a real null,
/// and either an integer or a numeric string.
fn deserialize_loose_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => None,
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) if s == "null" || s.is_empty() => None,
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveStatus {
    IsLive,
    IsUpcoming,
    PostLive,
    WasLive,
    #[default]
    NotLive,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatEntry {
    pub url: Option<String>,
    pub manifest_url: Option<String>,
}

impl VideoMetadataRecord {
    /// `release_timestamp` coerced to an integer; absent/null collapses to 0.
    #[must_use]
    pub fn release_ts(&self) -> i64 {
        self.release_timestamp.unwrap_or(0).max(0)
    }

    fn any_format_contains(&self, needle: &str) -> bool {
        self.formats.iter().any(|f| {
            f.url.as_deref().is_some_and(|u| u.contains(needle))
                || f.manifest_url.as_deref().is_some_and(|u| u.contains(needle))
        })
    }

    #[must_use]
    pub fn has_live_broadcast_source(&self) -> bool {
        self.any_format_contains("yt_live_broadcast")
    }

    #[must_use]
    pub fn has_premiere_broadcast_source(&self) -> bool {
        self.any_format_contains("yt_premiere_broadcast")
    }
}

/// A video URL plus the RTMP sink it should be re-muxed into.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub video_url: String,
    pub rtmp_url: String,
}

/// Outcome of running a single `PipelineJob` through the extractor/re-muxer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub extractor_exit: Option<i32>,
    pub remuxer_exit: Option<i32>,
}

impl PipelineOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.extractor_exit == Some(0) && self.remuxer_exit == Some(0)
    }
}
