use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mpd_timeline::{
    config::BuildConfig, node::DocumentNode, params::DocumentParameters, Manifest,
    RepresentationStream, TimelineResult,
};
use crate::init_test_tracing;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn availability_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// 30 two second segments, fetched `elapsed` seconds after availability start.
fn live_document(elapsed: i64) -> DocumentNode {
    let fetched = availability_start() + TimeDelta::seconds(elapsed);
    serde_json::from_value(serde_json::json!({
        "type": "dynamic",
        "manifestUrl": "https://live.example.com/channel/manifest.mpd",
        "availabilityStartTime": availability_start(),
        "publishTime": fetched,
        "timeShiftBufferDepth": 20.0,
        "minBufferTime": 2.0,
        "downloadRequestTime": fetched,
        "downloadCompleteTime": fetched,
        "parseCompleteTime": fetched,
        "Period": [{
            "id": "live",
            "start": 0.0,
            "AdaptationSet": [{
                "contentType": "video",
                "SegmentTemplate": {
                    "timescale": 1000,
                    "media": "$RepresentationID$/$Time$.m4s",
                    "initialization": "$RepresentationID$/init.mp4",
                    "SegmentTimeline": { "S": [{ "t": 0, "d": 2000, "r": 29 }] }
                },
                "Representation": [
                    { "id": "720p", "bandwidth": 3_000_000 },
                    { "id": "360p", "bandwidth": 800_000 }
                ]
            }]
        }]
    }))
    .unwrap()
}

fn build(elapsed: i64) -> TimelineResult<Manifest> {
    let span = tracing::info_span!("manifest", live = true);
    Manifest::build(&live_document(elapsed), &BuildConfig::default(), span)
}

#[test]
fn test_live_window() -> anyhow::Result<()> {
    init_test_tracing();
    let manifest = build(60)?;
    assert!(manifest.is_dynamic());
    assert_eq!(manifest.document().live_time(), Some(secs(60)));

    let period = &manifest.periods()[0];
    assert_eq!(period.start, Some(secs(0)));
    // no end anywhere, the timeline defines the duration
    assert_eq!(period.duration, Some(secs(60)));

    let stream = &period.adaptation_sets[0].representations[0].stream;
    // segment i is available during [2i + 2, 2i + 24)
    assert_eq!(stream.count(), 11);
    let segments = stream.segments();
    assert_eq!(
        segments[0].url.as_str(),
        "https://live.example.com/channel/720p/38000.m4s"
    );
    assert_eq!(
        segments[10].url.as_str(),
        "https://live.example.com/channel/720p/58000.m4s"
    );
    assert_eq!(
        stream.init_segment().unwrap().url.as_str(),
        "https://live.example.com/channel/720p/init.mp4"
    );

    assert_eq!(stream.segment_id_at(secs(10)), None);
    assert_eq!(stream.segment_id_at(secs(41)), Some(21));

    // three quarters of the 22s window back from the newest segment end
    assert_eq!(stream.start_segment_id(secs(60), secs(4)), Some(22));
    assert_eq!(stream.start_segment_id(secs(60), Duration::ZERO), Some(22));
    // 4 x 5s outweighs the window fraction
    assert_eq!(stream.start_segment_id(secs(60), secs(5)), Some(21));
    Ok(())
}

#[test]
fn test_reload_moves_window() -> anyhow::Result<()> {
    init_test_tracing();
    let mut manifest = build(60)?;
    let stream = &manifest.periods()[0].adaptation_sets[0].representations[1].stream;
    assert_eq!(
        stream.media_segment(20).map(|s| s.url.to_string()).as_deref(),
        Some("https://live.example.com/channel/360p/38000.m4s")
    );

    manifest.rebind(DocumentParameters::new(&live_document(70)));

    let stream = &manifest.periods()[0].adaptation_sets[0].representations[1].stream;
    assert_eq!(stream.count(), 6);
    assert_eq!(stream.media_segment(20), None);
    assert_eq!(stream.next_segment_id(25), Some(26));
    assert_eq!(stream.previous_segment_id(25), None);
    assert_eq!(
        stream.parameters().unwrap().document.live_time(),
        Some(secs(70))
    );
    Ok(())
}

#[test]
fn test_before_first_segment_is_available() -> anyhow::Result<()> {
    init_test_tracing();
    let manifest = build(1)?;

    let stream = &manifest.periods()[0].adaptation_sets[0].representations[0].stream;
    assert_eq!(stream.count(), 0);
    assert_eq!(stream.start_segment_id(secs(1), secs(4)), None);
    Ok(())
}
