use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{executor::execute_attempt, transport::Transport, HttpError, Response, Result, TransportRequest};

/// Delay strategy between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// `2^attempt` seconds after the zero-indexed failed attempt. The exponent
    /// is capped at 16, so no single wait exceeds 65,536 seconds.
    Exponential,
}

impl Backoff {
    pub(crate) fn from_delay_ms(retry_delay_ms: Option<u64>) -> Self {
        match retry_delay_ms {
            Some(ms) => Self::Fixed(Duration::from_millis(ms)),
            None => Self::Exponential,
        }
    }

    /// Delay to wait after `attempt` failed.
    pub fn delay(&self, attempt: usize) -> Duration {
        match self {
            Self::Fixed(delay) => *delay,
            Self::Exponential => {
                let exp = attempt.min(16) as u32;
                Duration::from_millis(1_000u64.saturating_mul(1u64 << exp))
            }
        }
    }
}

/// Retry budget and timing for one request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct RetryPolicy {
    pub retries: usize,
    pub backoff: Backoff,
    pub timeout: Duration,
}

/// Runs up to `policy.retries + 1` attempts.
///
/// `current_scope` is read at the start of every attempt. A failure observed
/// while that scope is revoked ends the loop immediately, and so does a
/// revocation during the backoff wait.
pub(crate) async fn execute_with_retry<F>(
    transport: &dyn Transport,
    request: &TransportRequest,
    policy: RetryPolicy,
    current_scope: F,
) -> Result<Response>
where
    F: Fn() -> CancellationToken,
{
    let mut attempt = 0usize;
    loop {
        let scope = current_scope();
        let err = match execute_attempt(transport, request, policy.timeout, &scope).await {
            Ok(response) => return Ok(response),
            Err(err) => err,
        };

        if scope.is_cancelled() || attempt >= policy.retries {
            return Err(err);
        }

        let delay = policy.backoff.delay(attempt);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            url = %request.url,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retrying request"
        );

        tokio::select! {
            biased;
            () = scope.cancelled() => return Err(HttpError::Aborted),
            () = sleep(delay) => {}
        }
        attempt += 1;
    }
}
