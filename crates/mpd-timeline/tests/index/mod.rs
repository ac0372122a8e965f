use std::time::Duration;

use mpd_timeline::{
    config::{BuildConfig, IndexFetchMode, RetryPolicy},
    fetch::{fetch_index, HttpIndexFetcher, IndexRequest},
    node::DocumentNode,
    util::http::HttpClient,
    ByteRange, FetchError, Manifest, RepresentationStream, TimeRange, TimelineError,
};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use url::Url;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::{build_sidx, init_test_tracing};

fn policy() -> RetryPolicy {
    RetryPolicy {
        attempt_timeout: Duration::from_millis(500),
        max_retries: 3,
        min_retry_delay: Duration::from_millis(1),
        max_retry_delay: Duration::from_millis(10),
    }
}

fn request(server: &MockServer) -> IndexRequest {
    let url = Url::parse(&format!("{}/video.mp4", server.uri())).unwrap();
    IndexRequest::new(url, ByteRange::new(800, 899))
}

#[tokio::test]
async fn test_partial_content() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header("range", "bytes=800-899"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![7u8; 100]))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpIndexFetcher::default();
    let data = fetch_index(&fetcher, &request(&server), &policy(), &CancellationToken::new())
        .await?
        .unwrap();

    assert_eq!(data.len(), 100);
    Ok(())
}

#[tokio::test]
async fn test_range_ignored_by_server() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let body: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let fetcher = HttpIndexFetcher::default();
    let data = fetch_index(&fetcher, &request(&server), &policy(), &CancellationToken::new())
        .await?
        .unwrap();

    assert_eq!(&data[..], &body[800..=899]);
    Ok(())
}

#[tokio::test]
async fn test_cookies_are_sent() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![1u8; 100]))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(reqwest::Client::builder())?;
    client.add_cookies(vec!["session=abc; Path=/".to_string()], server.uri())?;
    let fetcher = HttpIndexFetcher::new(client);
    let data = fetch_index(&fetcher, &request(&server), &policy(), &CancellationToken::new())
        .await?
        .unwrap();

    assert_eq!(data.len(), 100);
    Ok(())
}

#[tokio::test]
async fn test_not_found_is_not_retried() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpIndexFetcher::default();
    let result = fetch_index(&fetcher, &request(&server), &policy(), &CancellationToken::new()).await;

    match result {
        Err(TimelineError::IndexFetch {
            url,
            source: FetchError::Status(status),
        }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert!(url.as_str().ends_with("/video.mp4"));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_service_unavailable_is_retried() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![0u8; 100]))
        .mount(&server)
        .await;

    let fetcher = HttpIndexFetcher::default();
    let data = fetch_index(&fetcher, &request(&server), &policy(), &CancellationToken::new()).await?;

    assert!(data.is_some());
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_timeouts_exhaust_retries() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(206).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let policy = RetryPolicy {
        attempt_timeout: Duration::from_millis(100),
        max_retries: 1,
        ..policy()
    };
    let fetcher = HttpIndexFetcher::default();
    let result = fetch_index(&fetcher, &request(&server), &policy, &CancellationToken::new()).await;

    assert!(matches!(
        result,
        Err(TimelineError::IndexFetch {
            source: FetchError::Timeout,
            ..
        })
    ));
    Ok(())
}

#[tokio::test]
async fn test_cancel_in_flight_request() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/video.mp4"))
        .respond_with(ResponseTemplate::new(206).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let policy = RetryPolicy {
        attempt_timeout: Duration::from_secs(10),
        ..policy()
    };
    let fetcher = HttpIndexFetcher::default();
    let started = std::time::Instant::now();
    let data = fetch_index(&fetcher, &request(&server), &policy, &token).await?;

    assert!(data.is_none());
    assert!(started.elapsed() < Duration::from_secs(2));
    Ok(())
}

/// Single `SegmentBase` representation whose index sits right after a 800 byte init segment.
async fn indexed_document(server: &MockServer) -> DocumentNode {
    let sidx = build_sidx(1000, &[(50_000, 4000), (60_000, 4000), (40_000, 2000)]);
    let index_end = 799 + sidx.len() as u64;
    Mock::given(method("GET"))
        .and(path("/vod/video.mp4"))
        .and(header("range", format!("bytes=800-{index_end}").as_str()))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(sidx))
        .mount(server)
        .await;

    serde_json::from_value(serde_json::json!({
        "manifestUrl": format!("{}/vod/manifest.mpd", server.uri()),
        "mediaPresentationDuration": 10.0,
        "Period": [{
            "AdaptationSet": [{
                "contentType": "video",
                "Representation": [{
                    "id": "v1",
                    "bandwidth": 1_000_000,
                    "BaseURL": ["video.mp4"],
                    "SegmentBase": {
                        "indexRange": format!("800-{index_end}"),
                        "Initialization": { "range": "0-799" }
                    }
                }]
            }]
        }]
    }))
    .unwrap()
}

#[tokio::test]
async fn test_eager_index_fetch() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let document = indexed_document(&server).await;

    let manifest = Manifest::build_with_indices(
        &document,
        &BuildConfig::default(),
        &HttpIndexFetcher::default(),
        &CancellationToken::new(),
        Span::none(),
    )
    .await?;
    assert!(manifest.is_ready());

    let stream = &manifest.periods()[0].adaptation_sets[0].representations[0].stream;
    assert_eq!(stream.count(), 3);
    assert_eq!(stream.duration(), Some(Duration::from_secs(10)));

    let init = stream.init_segment().unwrap();
    assert_eq!(init.byte_range, Some(ByteRange::new(0, 799)));

    let second = stream.media_segment(1).unwrap();
    assert!(second.url.as_str().ends_with("/vod/video.mp4"));
    assert_eq!(
        second.time_range,
        Some(TimeRange::new(Duration::from_secs(4), Duration::from_secs(4)))
    );
    let first = stream.media_segment(0).unwrap().byte_range.unwrap();
    assert_eq!(second.byte_range.unwrap().start, first.end + 1);
    assert_eq!(second.byte_range.unwrap().length(), 60_000);

    assert_eq!(stream.segment_id_at(Duration::from_secs(9)), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_deferred_index_fetch() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let document = indexed_document(&server).await;

    let config = BuildConfig {
        index_fetch: IndexFetchMode::Deferred,
        retry: policy(),
        ..Default::default()
    };
    let fetcher = HttpIndexFetcher::default();
    let token = CancellationToken::new();
    let mut manifest =
        Manifest::build_with_indices(&document, &config, &fetcher, &token, Span::none()).await?;

    assert!(!manifest.is_ready());
    assert!(server.received_requests().await.unwrap().is_empty());

    assert!(manifest.load_indices(&fetcher, &token).await?);
    assert!(manifest.is_ready());
    let stream = &manifest.periods()[0].adaptation_sets[0].representations[0].stream;
    assert_eq!(stream.count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_missing_index_fails_build() -> anyhow::Result<()> {
    init_test_tracing();
    let server = MockServer::start().await;
    let document: DocumentNode = serde_json::from_value(serde_json::json!({
        "manifestUrl": format!("{}/manifest.mpd", server.uri()),
        "Period": [{
            "AdaptationSet": [{
                "SegmentBase": { "indexRange": "0-99" },
                "Representation": [{ "id": "a1", "BaseURL": ["missing.mp4"] }]
            }]
        }]
    }))?;

    let result = Manifest::build_with_indices(
        &document,
        &BuildConfig::default(),
        &HttpIndexFetcher::default(),
        &CancellationToken::new(),
        Span::none(),
    )
    .await;

    assert!(matches!(result, Err(TimelineError::IndexFetch { .. })));
    Ok(())
}
