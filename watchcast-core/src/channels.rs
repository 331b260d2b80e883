use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::model::ChannelRef;

#[derive(Debug, Deserialize)]
struct ChannelsFile {
    #[serde(default)]
    channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: i64,
    #[serde(default)]
    urls: serde_json::Value,
}

/// Loads the channel configuration file at `path`. Channels whose `urls` field
/// is not a JSON array are skipped rather than failing the whole load.
pub fn load_channels(path: &Path) -> Result<Vec<ChannelRef>> {
    let contents = std::fs::read_to_string(path)?;
    let parsed: ChannelsFile = serde_json::from_str(&contents)?;

    let channels = parsed
        .channels
        .into_iter()
        .filter_map(|raw| match raw.urls {
            serde_json::Value::Array(items) => {
                let urls = items
                    .into_iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Some(ChannelRef { id: raw.id, urls })
            }
            _ => {
                tracing::warn!(channel_id = raw.id, "skipping channel with non-list urls");
                None
            }
        })
        .collect();

    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_well_formed_channels() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"channels":[{{"id":1,"urls":["https://example.com/a"]}}]}}"#
        )
        .unwrap();
        let channels = load_channels(file.path()).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, 1);
        assert_eq!(channels[0].urls, vec!["https://example.com/a"]);
    }

    #[test]
    fn skips_channel_with_non_list_urls() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"channels":[{{"id":1,"urls":"not-a-list"}},{{"id":2,"urls":["https://example.com/b"]}}]}}"#
        )
        .unwrap();
        let channels = load_channels(file.path()).unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, 2);
    }
}
