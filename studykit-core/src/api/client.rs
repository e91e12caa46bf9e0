//! Bearer-token HTTP client for the ask endpoints.

use std::pin::Pin;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::api::error::TransportError;
use crate::api::models::{AnswerResponse, ChatParams};
use crate::api::retry::{RequestExecutor, RetryConfig, RetryPolicy};
use crate::config::ClientConfig;
use crate::config::constants::routes;

/// Raw byte fragments of one streaming response. Fragment boundaries are
/// arbitrary: they respect neither UTF-8 sequences nor protocol markers.
pub type ByteFragmentStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Seam between the streaming session and whatever opens its byte stream.
/// `open` either fails before the first byte (status or network) or yields
/// the fragment sequence.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn open(&self, params: &ChatParams) -> Result<ByteFragmentStream, TransportError>;
}

// No Debug derive: the bearer token must not leak into logs.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    token: String,
    config: ClientConfig,
    executor: RequestExecutor,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        Self::with_config(base_url, token, ClientConfig::default())
    }

    /// Create a client with custom HTTP tuning.
    pub fn with_config(
        base_url: impl Into<String>,
        token: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout)
            .tcp_keepalive(config.tcp_keepalive)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            config,
            executor: RequestExecutor::new(RetryPolicy::new(RetryConfig::atomic())),
        })
    }

    /// Replace the retry tuning for atomic requests.
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.executor = RequestExecutor::new(RetryPolicy::new(config));
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{}", self.base_url, route)
    }

    /// Ask without streaming: one JSON response carrying answer and sources.
    /// Transient failures are retried transparently.
    pub async fn ask(&self, params: &ChatParams) -> Result<AnswerResponse, TransportError> {
        self.executor
            .execute(|_attempt| self.post_json::<AnswerResponse, _>(routes::CHAT, params))
            .await
    }

    async fn post_json<T, B>(&self, route: &str, body: &B) -> Result<T, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + Sync,
    {
        let response = self
            .http
            .post(self.endpoint(route))
            .bearer_auth(&self.token)
            .timeout(self.config.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|err| TransportError::PayloadParse(err.to_string()))
    }

    /// Open the streaming ask endpoint. A non-2xx status is observable here,
    /// before any fragment; read failures surface through the stream items.
    pub async fn open_stream(
        &self,
        params: &ChatParams,
    ) -> Result<ByteFragmentStream, TransportError> {
        let response = self
            .http
            .post(self.endpoint(routes::CHAT_STREAM))
            .bearer_auth(&self.token)
            .json(params)
            .send()
            .await
            .map_err(|err| TransportError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                code: status.as_u16(),
                body,
            });
        }

        let fragments = response
            .bytes_stream()
            .map_err(|err| TransportError::StreamRead(err.to_string()));
        Ok(Box::pin(fragments))
    }
}

#[async_trait]
impl StreamTransport for ApiClient {
    async fn open(&self, params: &ChatParams) -> Result<ByteFragmentStream, TransportError> {
        self.open_stream(params).await
    }
}
