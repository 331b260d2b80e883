use crate::model::{BroadcastState, LiveStatus, VideoMetadataRecord};

/// Classifies a video's broadcast lifecycle position from its metadata.
///
/// Pure function of the record and the current time; rules are evaluated in
/// order and the first match wins. See the module-level decision table this
/// mirrors — `live_vod` requires a positive `release_ts` regardless of whether
/// `post_live` or `was_live` matched, which is a deliberate, literal reading of
/// an ambiguous upstream rule rather than the loosest possible interpretation.
#[must_use]
pub fn classify(record: &VideoMetadataRecord, now: i64) -> BroadcastState {
    let release_ts = record.release_ts();

    // Rule 1: live now.
    if record.has_live_broadcast_source()
        && record.is_live
        && record.live_status == LiveStatus::IsLive
        && !record.was_live
        && record.duration.is_none()
    {
        return BroadcastState::Live;
    }

    // Rule 2: premiere that has gone live.
    if record.has_premiere_broadcast_source()
        && record.live_status == LiveStatus::IsLive
        && release_ts > 0
        && !record.was_live
        && record.duration.is_some()
    {
        return BroadcastState::UpcomingLaunched;
    }

    // Rule 3: scheduled, not yet live.
    if record.live_status == LiveStatus::IsUpcoming
        && release_ts >= now
        && !record.was_live
        && record.formats.is_empty()
    {
        return BroadcastState::UpcomingScheduled;
    }

    // Upcoming-shaped metadata whose schedule is missing or already elapsed:
    // keep it in the upcoming family instead of falling through to `vod`.
    if record.live_status == LiveStatus::IsUpcoming && release_ts <= 0 {
        return BroadcastState::UpcomingPreLaunch;
    }

    // Rule 4: recording of a past live broadcast.
    if matches!(record.live_status, LiveStatus::PostLive | LiveStatus::WasLive) && release_ts > 0 {
        return BroadcastState::LiveVod;
    }

    // Rule 5, read literally: `not_live` with a stale positive release_ts still
    // falls to `vod`; no distinct state is reached by this combination.
    if record.live_status == LiveStatus::NotLive && !record.was_live && release_ts > 0 {
        return BroadcastState::Vod;
    }

    // Rule 6: everything else.
    BroadcastState::Vod
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FormatEntry;

    fn base() -> VideoMetadataRecord {
        VideoMetadataRecord::default()
    }

    #[test]
    fn live_broadcast_classifies_live() {
        let mut r = base();
        r.is_live = true;
        r.live_status = LiveStatus::IsLive;
        r.formats.push(FormatEntry {
            url: Some("https://example.com/yt_live_broadcast/abc".into()),
            manifest_url: None,
        });
        assert_eq!(classify(&r, 1000), BroadcastState::Live);
    }

    #[test]
    fn premiere_gone_live_classifies_upcoming_launched() {
        let mut r = base();
        r.live_status = LiveStatus::IsLive;
        r.release_timestamp = Some(500);
        r.duration = Some(120.0);
        r.formats.push(FormatEntry {
            url: None,
            manifest_url: Some("https://example.com/yt_premiere_broadcast/abc".into()),
        });
        assert_eq!(classify(&r, 1000), BroadcastState::UpcomingLaunched);
    }

    #[test]
    fn future_release_classifies_upcoming_scheduled() {
        let mut r = base();
        r.live_status = LiveStatus::IsUpcoming;
        r.release_timestamp = Some(2000);
        assert_eq!(classify(&r, 1000), BroadcastState::UpcomingScheduled);
    }

    #[test]
    fn release_ts_equal_to_now_is_inclusive() {
        let mut r = base();
        r.live_status = LiveStatus::IsUpcoming;
        r.release_timestamp = Some(1000);
        assert_eq!(classify(&r, 1000), BroadcastState::UpcomingScheduled);
    }

    #[test]
    fn upcoming_with_missing_schedule_is_pre_launch() {
        let mut r = base();
        r.live_status = LiveStatus::IsUpcoming;
        r.release_timestamp = None;
        assert_eq!(classify(&r, 1000), BroadcastState::UpcomingPreLaunch);
    }

    #[test]
    fn post_live_with_release_ts_is_live_vod() {
        let mut r = base();
        r.live_status = LiveStatus::PostLive;
        r.release_timestamp = Some(10);
        assert_eq!(classify(&r, 1000), BroadcastState::LiveVod);
    }

    #[test]
    fn was_live_with_release_ts_is_live_vod() {
        let mut r = base();
        r.live_status = LiveStatus::WasLive;
        r.release_timestamp = Some(10);
        assert_eq!(classify(&r, 1000), BroadcastState::LiveVod);
    }

    #[test]
    fn ordinary_upload_classifies_vod() {
        let r = base();
        assert_eq!(classify(&r, 1000), BroadcastState::Vod);
    }

    #[test]
    fn null_release_timestamp_collapses_to_zero() {
        let json = serde_json::json!({
            "video_id": "abc",
            "release_timestamp": serde_json::Value::Null,
        });
        let record: VideoMetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.release_ts(), 0);
    }

    #[test]
    fn string_null_release_timestamp_collapses_to_zero() {
        let json = serde_json::json!({
            "video_id": "abc",
            "release_timestamp": "null",
        });
        let record: VideoMetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.release_ts(), 0);
    }

    #[test]
    fn missing_release_timestamp_collapses_to_zero() {
        let json = serde_json::json!({ "video_id": "abc" });
        let record: VideoMetadataRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.release_ts(), 0);
    }

    #[test]
    fn classifying_twice_is_deterministic() {
        let mut r = base();
        r.live_status = LiveStatus::PostLive;
        r.release_timestamp = Some(42);
        assert_eq!(classify(&r, 1000), classify(&r, 1000));
    }
}
