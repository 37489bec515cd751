// HTTP fetcher: playlist text and segment bytes with retry logic.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::config::FetcherConfig;
use crate::error::StreamError;
use crate::retry::{RetryPolicy, retry_request};

/// Source of playlists and segments. The HTTP implementation is the
/// production one; tests inject fakes.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn fetch_playlist(&self, url: &Url) -> Result<Bytes, StreamError>;
    async fn fetch_segment(&self, url: &Url) -> Result<Bytes, StreamError>;
}

pub struct HttpFetcher {
    client: Client,
    config: FetcherConfig,
    token: CancellationToken,
}

impl HttpFetcher {
    pub fn new(config: FetcherConfig, token: CancellationToken) -> Result<Self, StreamError> {
        if config.accept_invalid_certs {
            debug!("TLS certificate validation is relaxed");
        }
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| StreamError::Internal {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            config,
            token,
        })
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_retries.saturating_add(1),
            base_delay: self.config.retry_delay_base,
            max_delay: self.config.max_retry_delay,
            ..RetryPolicy::default()
        }
    }

    /// One GET with the body streamed chunk-by-chunk so cancellation is
    /// observed between reads.
    async fn get_once(&self, url: &Url) -> Result<Bytes, StreamError> {
        let request = self
            .client
            .get(url.clone())
            .timeout(self.config.request_timeout);

        let response = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(StreamError::Cancelled),
            response = request.send() => response.map_err(|e| request_error(e, url))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }

        let capacity = response.content_length().unwrap_or(0) as usize;
        let mut buffer = BytesMut::with_capacity(capacity);
        let mut stream = response.bytes_stream();

        while let Some(chunk) = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(StreamError::Cancelled),
            next = stream.next() => next,
        } {
            let chunk = chunk.map_err(|e| request_error(e, url))?;
            buffer.extend_from_slice(&chunk);
        }

        trace!(url = %url, bytes = buffer.len(), "fetched");
        Ok(buffer.freeze())
    }

    async fn get_with_retries(&self, url: &Url) -> Result<Bytes, StreamError> {
        retry_request(&self.retry_policy(), &self.token, || self.get_once(url)).await
    }
}

/// Reqwest timeouts get their own variant so retry classification and
/// logs name the real cause.
fn request_error(e: reqwest::Error, url: &Url) -> StreamError {
    if e.is_timeout() {
        StreamError::Timeout {
            reason: format!("request to {url} timed out"),
        }
    } else {
        StreamError::Transport { source: e }
    }
}

#[async_trait]
impl MediaSource for HttpFetcher {
    async fn fetch_playlist(&self, url: &Url) -> Result<Bytes, StreamError> {
        self.get_with_retries(url).await
    }

    async fn fetch_segment(&self, url: &Url) -> Result<Bytes, StreamError> {
        self.get_with_retries(url).await
    }
}
