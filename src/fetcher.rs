//! Retrying HTTP GET client for the dashboard backend.
//!
//! Every endpoint is `GET {API_URL}/{path}` returning JSON. A fetch retries
//! transport, empty-body and decode failures after a fixed delay until its
//! attempt budget runs out. A missing or malformed base URL fails at once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;

/// Per-request timeout for the HTTP transport.
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Network seam: one GET, raw body out.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let resp = self.client.get(url.clone()).send().await?;

        if !resp.status().is_success() {
            return Err(FetchError::Transport(format!(
                "{} returned {}",
                url,
                resp.status()
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}

/// Retry budget for one logical fetch: `retries` extra attempts after the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[derive(Clone)]
pub struct Fetcher {
    base_url: Result<Url, FetchError>,
    transport: Arc<dyn Transport>,
}

impl Fetcher {
    /// The base URL is validated once here; a bad value poisons every fetch.
    pub fn new(base_url: Option<&str>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: parse_base_url(base_url),
            transport,
        }
    }

    pub fn endpoint_url(&self, path: &str) -> Result<Url, FetchError> {
        let base = self.base_url.as_ref().map_err(Clone::clone)?;
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// Fetch and decode `path`, retrying per `policy`.
    ///
    /// Attempts are strictly sequential. Returns the last error once the
    /// budget is spent, or immediately for non-retryable errors.
    pub async fn fetch<T, D>(&self, path: &str, decode: D, policy: RetryPolicy) -> Result<T, FetchError>
    where
        D: Fn(&[u8]) -> Result<T, FetchError>,
    {
        let url = self.endpoint_url(path)?;
        let mut attempts_left = policy.max_attempts();

        loop {
            attempts_left -= 1;

            let last_error = match self.transport.get(&url).await {
                Ok(body) if body.is_empty() => FetchError::EmptyBody,
                Ok(body) => match decode(&body) {
                    Ok(value) => return Ok(value),
                    Err(e) => e,
                },
                Err(e) => e,
            };

            if !last_error.is_retryable() || attempts_left == 0 {
                return Err(last_error);
            }

            log::debug!(
                "Fetcher: {} failed ({}), {} attempt(s) left, retrying in {:?}",
                path,
                last_error,
                attempts_left,
                policy.delay
            );
            tokio::time::sleep(policy.delay).await;
        }
    }
}

fn parse_base_url(raw: Option<&str>) -> Result<Url, FetchError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FetchError::Config("API_URL is not set".to_string()))?;

    // Without a trailing slash `join` would replace the last path segment.
    let mut url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(FetchError::Config(format!("API_URL '{}' cannot be a base", raw)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{HashMap, VecDeque};

    use parking_lot::Mutex;

    use super::*;

    /// Scripted transport: per-path queues of responses, then a fallback.
    #[derive(Default)]
    pub struct ScriptedTransport {
        scripts: Mutex<HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>>,
        fallback: Mutex<HashMap<String, Result<Vec<u8>, FetchError>>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl ScriptedTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Queue one response for `path`.
        pub fn push(&self, path: &str, response: Result<Vec<u8>, FetchError>) {
            self.scripts
                .lock()
                .entry(path.to_string())
                .or_default()
                .push_back(response);
        }

        pub fn push_json(&self, path: &str, body: serde_json::Value) {
            self.push(path, Ok(serde_json::to_vec(&body).unwrap()));
        }

        /// Response used once the queue for `path` is empty.
        pub fn set_fallback(&self, path: &str, response: Result<Vec<u8>, FetchError>) {
            self.fallback.lock().insert(path.to_string(), response);
        }

        pub fn calls(&self, path: &str) -> usize {
            self.calls.lock().get(path).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
            let path = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .to_string();
            *self.calls.lock().entry(path.clone()).or_insert(0) += 1;

            if let Some(response) = self
                .scripts
                .lock()
                .get_mut(&path)
                .and_then(|queue| queue.pop_front())
            {
                return response;
            }
            self.fallback
                .lock()
                .get(&path)
                .cloned()
                .unwrap_or_else(|| Err(FetchError::Transport("connection refused".to_string())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedTransport;
    use super::*;

    fn policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_secs(2))
    }

    fn decode_number(bytes: &[u8]) -> Result<u32, FetchError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    #[test]
    fn test_endpoint_url_appends_path() {
        let transport = ScriptedTransport::new();
        let with_slash = Fetcher::new(Some("https://api.example.com/v1/"), transport.clone());
        let without_slash = Fetcher::new(Some("https://api.example.com/v1"), transport);

        assert_eq!(
            with_slash.endpoint_url("accounts").unwrap().as_str(),
            "https://api.example.com/v1/accounts"
        );
        assert_eq!(
            without_slash.endpoint_url("activity").unwrap().as_str(),
            "https://api.example.com/v1/activity"
        );
    }

    #[tokio::test]
    async fn test_missing_base_url_is_config_error_without_attempts() {
        let transport = ScriptedTransport::new();
        let fetcher = Fetcher::new(None, transport.clone());

        let err = fetcher.fetch("activity", decode_number, policy(3)).await.unwrap_err();

        assert!(matches!(err, FetchError::Config(_)));
        assert_eq!(transport.calls("activity"), 0);
    }

    #[tokio::test]
    async fn test_malformed_base_url_is_config_error() {
        let fetcher = Fetcher::new(Some("not a url"), ScriptedTransport::new());
        let err = fetcher.fetch("activity", decode_number, policy(3)).await.unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_stops_after_retries_plus_one() {
        let transport = ScriptedTransport::new();
        let fetcher = Fetcher::new(Some("http://localhost:9000"), transport.clone());

        let started = tokio::time::Instant::now();
        let err = fetcher.fetch("accounts", decode_number, policy(3)).await.unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(transport.calls("accounts"), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_and_malformed_bodies_are_retried() {
        let transport = ScriptedTransport::new();
        transport.push("probability", Ok(Vec::new()));
        transport.push("probability", Ok(b"{oops".to_vec()));
        transport.push("probability", Ok(b"42".to_vec()));
        let fetcher = Fetcher::new(Some("http://localhost:9000"), transport.clone());

        let value = fetcher.fetch("probability", decode_number, policy(3)).await.unwrap();

        assert_eq!(value, 42);
        assert_eq!(transport.calls("probability"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let transport = ScriptedTransport::new();
        transport.push("activity", Ok(Vec::new()));
        let fetcher = Fetcher::new(Some("http://localhost:9000"), transport.clone());

        let err = fetcher.fetch("activity", decode_number, policy(0)).await.unwrap_err();

        assert_eq!(err, FetchError::EmptyBody);
        assert_eq!(transport.calls("activity"), 1);
    }
}
