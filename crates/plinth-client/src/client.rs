use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use backon::{ExponentialBuilder, Retryable};
use plinth_common::CancelToken;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::PlinthClientError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Debug)]
pub struct PlinthClientBuilder {
    cache: Option<PathBuf>,
    ttl: Duration,
    fetch_retries: usize,
    retry_min_delay: Duration,
    timeout: Duration,
    user_agent: String,
}

impl Default for PlinthClientBuilder {
    fn default() -> Self {
        Self {
            cache: None,
            ttl: DEFAULT_TTL,
            fetch_retries: 2,
            retry_min_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60 * 5),
            user_agent: "plinth".into(),
        }
    }
}

impl PlinthClientBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Directory for the URL-keyed response cache. Without one, every call
    /// goes to the network.
    pub fn cache(mut self, cache: impl AsRef<Path>) -> Self {
        self.cache = Some(PathBuf::from(cache.as_ref()));
        self
    }

    /// How long a cached response stays fresh. Within the TTL, a cached
    /// response is served regardless of upstream state.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Number of retries after the first failed attempt.
    pub fn fetch_retries(mut self, fetch_retries: usize) -> Self {
        self.fetch_retries = fetch_retries;
        self
    }

    /// First retry delay; doubles on each subsequent attempt.
    pub fn retry_min_delay(mut self, delay: Duration) -> Self {
        self.retry_min_delay = delay;
        self
    }

    pub fn user_agent(mut self, user_agent: impl AsRef<str>) -> Self {
        self.user_agent = user_agent.as_ref().into();
        self
    }

    pub fn build(self) -> PlinthClient {
        let client = ClientBuilder::new()
            .user_agent(self.user_agent.clone())
            .pool_max_idle_per_host(20)
            .timeout(self.timeout)
            .build()
            .expect("Fail to build HTTP client.");
        PlinthClient {
            client,
            cache: self.cache,
            ttl: self.ttl,
            fetch_retries: self.fetch_retries,
            retry_min_delay: self.retry_min_delay,
        }
    }
}

/// HTTP GET over a URL-keyed disk cache. A hit inside the TTL returns the
/// stored bytes without touching the network; a miss performs the request,
/// writes the result back, and returns it. `refresh` bypasses the read but
/// still writes back.
#[derive(Clone, Debug)]
pub struct PlinthClient {
    client: Client,
    cache: Option<PathBuf>,
    ttl: Duration,
    fetch_retries: usize,
    retry_min_delay: Duration,
}

impl Default for PlinthClient {
    fn default() -> Self {
        PlinthClientBuilder::new().build()
    }
}

impl PlinthClient {
    pub fn builder() -> PlinthClientBuilder {
        PlinthClientBuilder::new()
    }

    pub async fn get(&self, url: &Url, refresh: bool) -> Result<Vec<u8>, PlinthClientError> {
        self.get_with(url, refresh, &CancelToken::new()).await
    }

    /// Like [`PlinthClient::get`], honoring `cancel` between retry attempts.
    pub async fn get_with(
        &self,
        url: &Url,
        refresh: bool,
        cancel: &CancelToken,
    ) -> Result<Vec<u8>, PlinthClientError> {
        if cancel.is_cancelled() {
            return Err(PlinthClientError::Cancelled);
        }
        if !refresh {
            if let Some(bytes) = self.cache_read(url).await? {
                tracing::debug!("cache hit for {url}");
                return Ok(bytes);
            }
        }
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.retry_min_delay)
            .with_max_times(self.fetch_retries);
        let token = cancel.clone();
        let result = (|| async { self.fetch_once(url).await })
            .retry(&backoff)
            .when(move |err: &PlinthClientError| err.is_retryable() && !token.is_cancelled())
            .await;
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(err) if err.is_retryable() && cancel.is_cancelled() => {
                return Err(PlinthClientError::Cancelled)
            }
            Err(err) => return Err(err),
        };
        self.cache_write(url, &bytes).await?;
        Ok(bytes)
    }

    /// GET + JSON decode.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &Url,
        refresh: bool,
        cancel: &CancelToken,
    ) -> Result<T, PlinthClientError> {
        let bytes = self.get_with(url, refresh, cancel).await?;
        serde_json::from_slice(&bytes).map_err(|source| PlinthClientError::Decode {
            url: url.clone(),
            source,
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<Vec<u8>, PlinthClientError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.classify(url, err))?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Err(PlinthClientError::NotFound(url.clone()));
        }
        if status.is_server_error() {
            return Err(PlinthClientError::Network {
                url: url.clone(),
                reason: format!("status {status}"),
            });
        }
        if !status.is_success() {
            return Err(PlinthClientError::Status {
                status: status.as_u16(),
                url: url.clone(),
            });
        }
        let bytes = response.bytes().await.map_err(|err| self.classify(url, err))?;
        Ok(bytes.to_vec())
    }

    fn classify(&self, url: &Url, err: reqwest::Error) -> PlinthClientError {
        if err.is_timeout() || err.is_connect() {
            PlinthClientError::Network {
                url: url.clone(),
                reason: err.to_string(),
            }
        } else {
            PlinthClientError::Request(err)
        }
    }

    async fn cache_read(&self, url: &Url) -> Result<Option<Vec<u8>>, PlinthClientError> {
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        let key = url.as_str();
        let meta = match cacache::metadata(cache, key).await {
            Ok(Some(meta)) => meta,
            Ok(None) => return Ok(None),
            Err(source) => {
                return Err(PlinthClientError::Cache {
                    op: "read",
                    key: key.into(),
                    source,
                })
            }
        };
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        // An entry expires exactly at the boundary, so a zero TTL never hits.
        if meta.time + self.ttl.as_millis() <= now_ms {
            return Ok(None);
        }
        match cacache::read(cache, key).await {
            Ok(bytes) => Ok(Some(bytes)),
            // Entry vanished between the metadata check and the read.
            Err(cacache::Error::EntryNotFound(..)) => Ok(None),
            Err(source) => Err(PlinthClientError::Cache {
                op: "read",
                key: key.into(),
                source,
            }),
        }
    }

    async fn cache_write(&self, url: &Url, bytes: &[u8]) -> Result<(), PlinthClientError> {
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        let key = url.as_str();
        cacache::write(cache, key, bytes)
            .await
            .map_err(|source| PlinthClientError::Cache {
                op: "write",
                key: key.into(),
                source,
            })?;
        Ok(())
    }
}
