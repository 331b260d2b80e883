use std::collections::HashSet;

use url::Url;
use watchcast_core::model::VideoId;

use crate::error::{Error, Result};

/// Normalizes a channel URL to scheme + host + path with the trailing slash
/// stripped, and rejects hosts outside `allowed_hosts`.
pub fn normalize_channel_url(raw: &str, allowed_hosts: &[String]) -> Result<String> {
    let parsed = Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(raw.to_string()))?;

    if !allowed_hosts.iter().any(|h| h == host) {
        return Err(Error::DisallowedHost(host.to_string()));
    }

    let path = parsed.path().trim_end_matches('/');
    Ok(format!("{}://{}{}", parsed.scheme(), host, path))
}

/// Extracts the set of video IDs currently visible on one channel URL.
///
/// Shells out to the configured discovery tool with `--flat-playlist` so the
/// call stays a shallow enumeration; per-video metadata is a separate fetch
/// (see [`crate::resolver`]). Any failure — bad host, spawn failure, non-zero
/// exit, malformed output — yields the empty set; this probe never fails the
/// caller's tick.
pub struct ChannelProbe {
    binary: String,
    allowed_hosts: Vec<String>,
}

impl ChannelProbe {
    #[must_use]
    pub fn new(binary: String, allowed_hosts: Vec<String>) -> Self {
        Self {
            binary,
            allowed_hosts,
        }
    }

    pub async fn probe(&self, channel_url: &str) -> HashSet<VideoId> {
        let normalized = match normalize_channel_url(channel_url, &self.allowed_hosts) {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(url = channel_url, error = %err, "rejecting channel url");
                return HashSet::new();
            }
        };

        match self.run_listing(&normalized).await {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(url = normalized, error = %err, "channel probe failed");
                HashSet::new()
            }
        }
    }

    async fn run_listing(&self, url: &str) -> Result<HashSet<VideoId>> {
        let output = tokio::process::Command::new(&self.binary)
            .args(["--flat-playlist", "--dump-json", "--no-warnings", url])
            .output()
            .await
            .map_err(|e| Error::Spawn("discovery", e))?;

        if !output.status.success() {
            return Ok(HashSet::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut ids = HashSet::new();
        for line in stdout.lines() {
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
                if let Some(id) = value.get("id").and_then(|v| v.as_str()) {
                    ids.insert(id.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts() -> Vec<String> {
        vec!["www.youtube.com".to_string()]
    }

    #[test]
    fn normalizes_trailing_slash() {
        let url = normalize_channel_url("https://www.youtube.com/@channel/", &hosts()).unwrap();
        assert_eq!(url, "https://www.youtube.com/@channel");
    }

    #[test]
    fn rejects_disallowed_host() {
        let err = normalize_channel_url("https://evil.example.com/@channel", &hosts());
        assert!(matches!(err, Err(Error::DisallowedHost(_))));
    }

    #[test]
    fn rejects_unparseable_url() {
        let err = normalize_channel_url("not a url", &hosts());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn probe_on_disallowed_host_yields_empty_set() {
        let probe = ChannelProbe::new("yt-dlp".to_string(), hosts());
        let ids = probe.probe("https://evil.example.com/@channel").await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn probe_on_missing_binary_yields_empty_set() {
        let probe = ChannelProbe::new("definitely-not-a-real-binary".to_string(), hosts());
        let ids = probe.probe("https://www.youtube.com/@channel").await;
        assert!(ids.is_empty());
    }
}
