use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Body, Method};

/// Default per-attempt timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

/// Proxy behavior of the default transport.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxySetting {
    /// Use the proxies from the environment (`HTTP_PROXY`, `HTTPS_PROXY`, ...).
    #[default]
    System,
    /// Never use a proxy.
    Disabled,
    /// Route every request through this proxy URL.
    Url(String),
}

/// Connection-level settings forwarded to the default transport.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Serialize)]
pub struct AgentOptions {
    pub pool_idle_timeout_ms: Option<u64>,
    pub pool_max_idle_per_host: Option<usize>,
    pub tcp_keepalive_ms: Option<u64>,
    pub user_agent: Option<String>,
}

/// Client-wide configuration. Fixed once the client is built.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ClientConfig {
    /// Prefix for relative request URLs.
    pub base_url: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Headers sent with every request.
    pub headers: BTreeMap<String, String>,
    /// Number of retries after the initial attempt.
    pub retries: usize,
    /// Fixed delay between retries. `None` selects exponential backoff.
    pub retry_delay_ms: Option<u64>,
    pub proxy: ProxySetting,
    pub agent: AgentOptions,
    /// Idle time after which the client disposes itself. `None` or `0` disables it.
    pub auto_dispose_after_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            headers: BTreeMap::new(),
            retries: 0,
            retry_delay_ms: None,
            proxy: ProxySetting::default(),
            agent: AgentOptions::default(),
            auto_dispose_after_ms: None,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults and the given base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
            ..Self::default()
        }
    }

    pub(crate) fn idle_threshold_ms(&self) -> Option<u64> {
        self.auto_dispose_after_ms.filter(|ms| *ms > 0)
    }
}

/// Per-request overrides. Unset fields fall back to the client configuration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Option<Method>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Body>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<usize>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Adds a header; a later call with the same name replaces the value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> crate::Result<Self> {
        self.body = Some(Body::json(value)?);
        Ok(self)
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = Some(retries);
        self
    }
}
