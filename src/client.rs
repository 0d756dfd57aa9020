use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::{
    lifecycle,
    request::{merge_headers, prepare_body, resolve_url},
    retry::{execute_with_retry, Backoff, RetryPolicy},
    transport::{ReqwestTransport, Transport, TransportRequest},
    ClientConfig, Method, RequestOptions, Response, Result,
};

/// Async HTTP client with retries, cancellation and optional idle disposal.
///
/// Cloning is cheap and every clone refers to the same client: disposing or
/// aborting through one handle affects all of them. When the last handle is
/// dropped the client is disposed.
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<ClientState>,
}

pub(crate) struct ClientState {
    /// Scope shared by every attempt that starts while it is current.
    pub(crate) scope: CancellationToken,
    pub(crate) active: HashSet<u64>,
    pub(crate) next_request_id: u64,
    pub(crate) last_activity: Instant,
    pub(crate) disposed: bool,
    pub(crate) idle_timer: Option<JoinHandle<()>>,
}

impl ClientInner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_scope(&self) -> CancellationToken {
        self.lock_state().scope.clone()
    }
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = &self.inner.config;
        f.debug_struct("HttpClient")
            .field("base_url", &config.base_url)
            .field("timeout_ms", &config.timeout_ms)
            .field("retries", &config.retries)
            .field("headers", &config.headers.keys().collect::<Vec<_>>())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Creates a client using the default `reqwest` transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client on top of a custom transport.
    ///
    /// With a positive `auto_dispose_after_ms`, this must be called inside a
    /// tokio runtime for the idle watcher to be scheduled.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let inner = Arc::new(ClientInner {
            config,
            transport,
            state: Mutex::new(ClientState {
                scope: CancellationToken::new(),
                active: HashSet::new(),
                next_request_id: 0,
                last_activity: Instant::now(),
                disposed: false,
                idle_timer: None,
            }),
        });
        lifecycle::schedule_idle_check(&inner, &mut inner.lock_state());
        Self { inner }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }

    /// Number of requests currently in flight.
    pub fn active_requests(&self) -> usize {
        self.inner.lock_state().active.len()
    }

    /// Returns `true` when both handles refer to the same client.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[cfg(test)]
    pub(crate) fn inner_for_tests(&self) -> Arc<ClientInner> {
        Arc::clone(&self.inner)
    }

    /// Sends a request. The method defaults to GET when `options.method` is unset.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<Response> {
        let _active = lifecycle::begin_request(&self.inner)?;
        let config = &self.inner.config;

        let body = prepare_body(options.body);
        let request = TransportRequest {
            method: options.method.unwrap_or_default(),
            url: resolve_url(config.base_url.as_deref(), url),
            headers: merge_headers(&config.headers, &options.headers, body.as_ref())?,
            body,
        };
        let policy = RetryPolicy {
            retries: options.retries.unwrap_or(config.retries),
            backoff: Backoff::from_delay_ms(config.retry_delay_ms),
            timeout: Duration::from_millis(options.timeout_ms.unwrap_or(config.timeout_ms)),
        };

        execute_with_retry(self.inner.transport.as_ref(), &request, policy, || {
            self.inner.current_scope()
        })
        .await
    }

    pub async fn get(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Get)).await
    }

    pub async fn post(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Post)).await
    }

    pub async fn put(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Put)).await
    }

    pub async fn delete(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Delete)).await
    }

    pub async fn patch(&self, url: &str, options: RequestOptions) -> Result<Response> {
        self.request(url, options.method(Method::Patch)).await
    }

    /// Cancels every in-flight attempt and installs a fresh scope, so the
    /// client stays usable for later requests.
    pub fn abort(&self) {
        let mut state = self.inner.lock_state();
        if state.disposed {
            return;
        }
        let revoked = std::mem::replace(&mut state.scope, CancellationToken::new());
        let in_flight = state.active.len();
        drop(state);

        revoked.cancel();

        #[cfg(feature = "tracing")]
        tracing::debug!(in_flight, "aborted in-flight requests");
        #[cfg(not(feature = "tracing"))]
        let _ = in_flight;
    }

    /// Disposes the client. Later requests fail with
    /// [`HttpError::Disposed`](crate::HttpError::Disposed). Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::HttpClient;
    use crate::{
        transport::{Transport, TransportRequest, TransportResponse},
        BoxError, ClientConfig,
    };

    struct Unused;

    #[async_trait]
    impl Transport for Unused {
        async fn perform(
            &self,
            _request: TransportRequest,
            _cancel: CancellationToken,
        ) -> Result<TransportResponse, BoxError> {
            Err("unused".into())
        }
    }

    #[test]
    fn debug_hides_header_values() {
        let mut config = ClientConfig::with_base_url("https://api.test");
        config
            .headers
            .insert("Authorization".to_owned(), "Bearer secret-token".to_owned());
        let client = HttpClient::with_transport(config, Arc::new(Unused));
        let debug = format!("{client:?}");
        assert!(debug.contains("Authorization"));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn clones_share_state() {
        let client = HttpClient::with_transport(ClientConfig::default(), Arc::new(Unused));
        let other = client.clone();
        assert!(client.ptr_eq(&other));
        other.dispose();
        assert!(client.is_disposed());
    }

    #[test]
    fn abort_installs_fresh_scope() {
        let client = HttpClient::with_transport(ClientConfig::default(), Arc::new(Unused));
        let before = client.inner.current_scope();
        client.abort();
        let after = client.inner.current_scope();
        assert!(before.is_cancelled());
        assert!(!after.is_cancelled());
        assert!(!client.is_disposed());
    }

    #[test]
    fn dispose_revokes_scope_once() {
        let client = HttpClient::with_transport(ClientConfig::default(), Arc::new(Unused));
        let scope = client.inner.current_scope();
        client.dispose();
        client.dispose();
        assert!(scope.is_cancelled());
        assert!(client.is_disposed());
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let client = HttpClient::with_transport(ClientConfig::default(), Arc::new(Unused));
        let scope = client.inner.current_scope();
        let other = client.clone();
        drop(client);
        assert!(!scope.is_cancelled());
        drop(other);
        assert!(scope.is_cancelled());
    }
}
