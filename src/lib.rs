//! `resilient-http` is an async HTTP client with retries, cancellation scopes,
//! idle auto-disposal and a keyed client pool.
//!
//! - [`HttpClient`] resolves URLs against a base URL, merges headers, prepares
//!   bodies and retries failed attempts with backoff.
//! - [`HttpClient::abort`] cancels every in-flight request while keeping the
//!   client usable; [`HttpClient::dispose`] shuts it down for good.
//! - [`ClientPool`] hands out one shared client per configuration.
//!
//! The network is reached through the [`Transport`] trait; [`ReqwestTransport`]
//! is the default implementation.

mod client;
mod decode;
mod error;
mod executor;
mod lifecycle;
mod options;
mod pool;
mod request;
mod retry;
mod transport;
mod types;

pub use client::HttpClient;
pub use error::{BoxError, HttpError};
pub use options::{AgentOptions, ClientConfig, ProxySetting, RequestOptions, DEFAULT_TIMEOUT_MS};
pub use pool::{ClientPool, POOL_AUTO_DISPOSE_AFTER_MS};
pub use request::resolve_url;
pub use retry::Backoff;
pub use transport::{PreparedBody, ReqwestTransport, Transport, TransportRequest, TransportResponse};
pub use types::{Body, Method, Response, ResponseBody};

pub type Result<T> = std::result::Result<T, HttpError>;
