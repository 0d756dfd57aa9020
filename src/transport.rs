use std::fmt;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;

use crate::{BoxError, ClientConfig, HttpError, Method, ProxySetting, Result};

/// Body after preparation, ready to be written by a transport.
#[derive(Clone, Debug, PartialEq)]
pub enum PreparedBody {
    Text(String),
    Form(Vec<(String, String)>),
    Blob(Vec<u8>),
}

/// Fully resolved inputs of one HTTP exchange.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<PreparedBody>,
}

/// Raw result of one HTTP exchange.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    /// Header pairs in wire order; names may repeat.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Performs a single HTTP exchange.
///
/// Implementations should stop work and return an error once `cancel` fires.
/// The caller also drops the returned future on cancellation, so observing the
/// token is only required for work spawned outside of it.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<TransportResponse, BoxError>;
}

/// Default transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Wraps an already configured `reqwest` client.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Builds a `reqwest` client from the proxy and agent settings of `config`.
    ///
    /// Timeouts are enforced per attempt by the executor, not by `reqwest`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();

        builder = match &config.proxy {
            ProxySetting::System => builder,
            ProxySetting::Disabled => builder.no_proxy(),
            ProxySetting::Url(url) => {
                let proxy = reqwest::Proxy::all(url.as_str())
                    .map_err(|err| HttpError::Config(format!("invalid proxy '{url}': {err}")))?;
                builder.proxy(proxy)
            }
        };

        let agent = &config.agent;
        if let Some(ms) = agent.pool_idle_timeout_ms {
            builder = builder.pool_idle_timeout(Duration::from_millis(ms));
        }
        if let Some(max) = agent.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(max);
        }
        if let Some(ms) = agent.tcp_keepalive_ms {
            builder = builder.tcp_keepalive(Duration::from_millis(ms));
        }
        if let Some(user_agent) = &agent.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }

        let http = builder
            .build()
            .map_err(|err| HttpError::Config(format!("cannot build transport: {err}")))?;
        Ok(Self { http })
    }

    async fn exchange(
        &self,
        request: TransportRequest,
    ) -> std::result::Result<TransportResponse, reqwest::Error> {
        let builder = self
            .http
            .request(request.method.into(), &request.url)
            .headers(request.headers);
        let builder = match request.body {
            None => builder,
            Some(PreparedBody::Text(text)) => builder.body(text),
            Some(PreparedBody::Blob(bytes)) => builder.body(bytes),
            Some(PreparedBody::Form(pairs)) => builder.form(&pairs),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_owned(),
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(
        &self,
        request: TransportRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<TransportResponse, BoxError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                Err(io::Error::new(io::ErrorKind::Interrupted, "exchange cancelled").into())
            }
            result = self.exchange(request) => result.map_err(Into::into),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ReqwestTransport;
    use crate::{ClientConfig, HttpError, ProxySetting};

    #[test]
    fn builds_from_default_config() {
        let transport = ReqwestTransport::from_config(&ClientConfig::default());
        assert!(transport.is_ok());
    }

    #[test]
    fn rejects_malformed_proxy_url() {
        let config = ClientConfig {
            proxy: ProxySetting::Url("http://[bad".to_owned()),
            ..ClientConfig::default()
        };
        let err = ReqwestTransport::from_config(&config).expect_err("must fail");
        assert!(matches!(err, HttpError::Config(_)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        use super::{Transport, TransportRequest};
        use tokio_util::sync::CancellationToken;

        let transport = ReqwestTransport::from_config(&ClientConfig::default()).expect("build");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = TransportRequest {
            method: crate::Method::Get,
            url: "http://127.0.0.1:9/never".to_owned(),
            headers: Default::default(),
            body: None,
        };
        let err = transport
            .perform(request, cancel)
            .await
            .expect_err("must be cancelled");
        assert!(err.to_string().contains("cancelled"));
    }
}
