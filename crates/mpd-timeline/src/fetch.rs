use std::future::Future;

use bytes::Bytes;
use reqwest::{header::RANGE, StatusCode};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::RetryPolicy, error::FetchError, util::http::HttpClient, ByteRange, TimelineError,
    TimelineResult,
};

/// Byte range of a resource holding a segment index box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRequest {
    pub url: Url,
    pub range: ByteRange,
}

impl IndexRequest {
    pub fn new(url: Url, range: ByteRange) -> Self {
        Self { url, range }
    }
}

/// Transport collaborator downloading index boxes.
///
/// A single call is a single attempt. Implementations should return
/// [`FetchError::Cancelled`] promptly once `token` is cancelled.
pub trait IndexFetcher {
    fn fetch(
        &self,
        request: &IndexRequest,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send;
}

#[derive(Clone, Default)]
pub struct HttpIndexFetcher {
    client: HttpClient,
}

impl HttpIndexFetcher {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl IndexFetcher for HttpIndexFetcher {
    fn fetch(
        &self,
        request: &IndexRequest,
        token: &CancellationToken,
    ) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
        let range = request.range;
        let builder = self
            .client
            .get(request.url.clone())
            .header(RANGE, range.to_http_range());
        let token = token.clone();

        async move {
            let response = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(FetchError::Cancelled),
                response = builder.send() => response?,
            };

            let status = response.status();
            if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
                return Err(FetchError::Status(status));
            }

            let bytes = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(FetchError::Cancelled),
                bytes = response.bytes() => bytes?,
            };

            // Servers ignoring the range answer with the whole resource
            if status == StatusCode::OK && bytes.len() as u64 > range.end {
                tracing::debug!(%range, size = bytes.len(), "Range ignored by server, slicing");
                return Ok(bytes.slice(range.start as usize..=range.end as usize));
            }
            Ok(bytes)
        }
    }
}

/// Fetches an index box, retrying timeouts and transient failures.
///
/// Returns `Ok(None)` once `token` is cancelled.
pub async fn fetch_index<F>(
    fetcher: &F,
    request: &IndexRequest,
    policy: &RetryPolicy,
    token: &CancellationToken,
) -> TimelineResult<Option<Bytes>>
where
    F: IndexFetcher,
{
    let mut retries = policy.max_retries;

    loop {
        let attempt = tokio::time::timeout(policy.attempt_timeout, fetcher.fetch(request, token));
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = attempt => result.unwrap_or(Err(FetchError::Timeout)),
        };

        let error = match result {
            Ok(data) => return Ok(Some(data)),
            Err(FetchError::Cancelled) => return Ok(None),
            Err(error) => error,
        };

        if retries == 0 || !error.is_retryable() {
            tracing::error!(url = %request.url, range = %request.range, "Fetching segment index failed: {error}");
            return Err(TimelineError::IndexFetch {
                url: request.url.clone(),
                source: error,
            });
        }

        retries -= 1;
        let delay = policy.retry_delay();
        tracing::warn!(
            url = %request.url,
            retries_left = retries,
            "Fetching segment index failed, retry in {delay:?}. {error}"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(None),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use super::*;

    /// Answers with the scripted outcomes in order, then with the last one forever.
    struct ScriptedFetcher {
        script: Mutex<Vec<Outcome>>,
        calls: AtomicUsize,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Data,
        Status(u16),
        Hang,
    }

    impl ScriptedFetcher {
        fn new(mut script: Vec<Outcome>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl IndexFetcher for ScriptedFetcher {
        fn fetch(
            &self,
            _request: &IndexRequest,
            _token: &CancellationToken,
        ) -> impl Future<Output = Result<Bytes, FetchError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = {
                let mut script = self.script.lock().unwrap();
                if script.len() > 1 {
                    script.pop().unwrap()
                } else {
                    script[0]
                }
            };

            async move {
                match outcome {
                    Outcome::Data => Ok(Bytes::from_static(b"sidx")),
                    Outcome::Status(code) => {
                        Err(FetchError::Status(StatusCode::from_u16(code).unwrap()))
                    }
                    Outcome::Hang => {
                        tokio::time::sleep(Duration::from_secs(3600)).await;
                        Ok(Bytes::new())
                    }
                }
            }
        }
    }

    fn request() -> IndexRequest {
        IndexRequest::new(
            Url::parse("https://example.com/video.mp4").unwrap(),
            ByteRange::new(800, 899),
        )
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempt_timeout: Duration::from_millis(50),
            max_retries: 3,
            min_retry_delay: Duration::from_millis(1),
            max_retry_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_failures() {
        let fetcher = ScriptedFetcher::new(vec![
            Outcome::Status(503),
            Outcome::Hang,
            Outcome::Data,
        ]);
        let data = fetch_index(&fetcher, &request(), &policy(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(data.as_deref(), Some(&b"sidx"[..]));
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_definitive() {
        let fetcher = ScriptedFetcher::new(vec![Outcome::Status(404)]);
        let error = fetch_index(&fetcher, &request(), &policy(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(fetcher.calls(), 1);
        assert!(matches!(
            error,
            TimelineError::IndexFetch {
                source: FetchError::Status(StatusCode::NOT_FOUND),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let fetcher = ScriptedFetcher::new(vec![Outcome::Hang]);
        let error = fetch_index(&fetcher, &request(), &policy(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(fetcher.calls(), 4);
        assert!(matches!(
            error,
            TimelineError::IndexFetch {
                source: FetchError::Timeout,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cancellation_returns_nothing() {
        let fetcher = ScriptedFetcher::new(vec![Outcome::Hang]);
        let token = CancellationToken::new();
        let policy = RetryPolicy {
            attempt_timeout: Duration::from_secs(60),
            ..policy()
        };

        let cancel = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        });

        let data = fetch_index(&fetcher, &request(), &policy, &token).await.unwrap();
        assert!(data.is_none());
        assert_eq!(fetcher.calls(), 1);
    }
}
