use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{decode::decode_response, transport::Transport, HttpError, Response, Result, TransportRequest};

/// Performs exactly one exchange bounded by `timeout`.
///
/// The transport receives a child of `scope`: the timeout cancels only that
/// child, while revoking `scope` cancels it as well and yields
/// [`HttpError::Aborted`].
pub(crate) async fn execute_attempt(
    transport: &dyn Transport,
    request: &TransportRequest,
    timeout: Duration,
    scope: &CancellationToken,
) -> Result<Response> {
    let attempt_token = scope.child_token();
    let exchange = transport.perform(request.clone(), attempt_token.clone());

    let raw = tokio::select! {
        biased;
        () = scope.cancelled() => return Err(HttpError::Aborted),
        () = sleep(timeout) => {
            attempt_token.cancel();
            #[cfg(feature = "tracing")]
            tracing::debug!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "attempt timed out");
            return Err(HttpError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        result = exchange => result.map_err(|err| {
            if scope.is_cancelled() {
                HttpError::Aborted
            } else {
                HttpError::Transport(err)
            }
        })?,
    };

    decode_response(raw)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use super::execute_attempt;
    use crate::{
        transport::{Transport, TransportRequest, TransportResponse},
        BoxError, HttpError, Method, ResponseBody,
    };

    struct Fixed(u16);

    #[async_trait]
    impl Transport for Fixed {
        async fn perform(
            &self,
            _request: TransportRequest,
            _cancel: CancellationToken,
        ) -> Result<TransportResponse, BoxError> {
            Ok(TransportResponse {
                status: self.0,
                status_text: "Whatever".to_owned(),
                headers: vec![("content-type".to_owned(), "text/plain".to_owned())],
                body: b"ok".to_vec(),
            })
        }
    }

    /// Never answers; resolves only when its token is cancelled.
    struct Hanging;

    #[async_trait]
    impl Transport for Hanging {
        async fn perform(
            &self,
            _request: TransportRequest,
            cancel: CancellationToken,
        ) -> Result<TransportResponse, BoxError> {
            cancel.cancelled().await;
            Err("cancelled".into())
        }
    }

    fn request() -> TransportRequest {
        TransportRequest {
            method: Method::Get,
            url: "https://api.test/x".to_owned(),
            headers: Default::default(),
            body: None,
        }
    }

    #[tokio::test]
    async fn success_is_decoded() {
        let scope = CancellationToken::new();
        let response = execute_attempt(&Fixed(200), &request(), Duration::from_secs(1), &scope)
            .await
            .expect("must succeed");
        assert_eq!(response.body, ResponseBody::Text("ok".to_owned()));
    }

    #[tokio::test]
    async fn non_success_status_fails() {
        let scope = CancellationToken::new();
        let err = execute_attempt(&Fixed(500), &request(), Duration::from_secs(1), &scope)
            .await
            .expect_err("must fail");
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_leaves_scope_intact() {
        let scope = CancellationToken::new();
        let err = execute_attempt(&Hanging, &request(), Duration::from_millis(50), &scope)
            .await
            .expect_err("must time out");
        assert!(matches!(err, HttpError::Timeout { timeout_ms: 50 }));
        assert!(!scope.is_cancelled());
    }

    #[tokio::test]
    async fn revoked_scope_aborts() {
        let scope = CancellationToken::new();
        scope.cancel();
        let err = execute_attempt(&Hanging, &request(), Duration::from_secs(5), &scope)
            .await
            .expect_err("must abort");
        assert!(err.is_cancellation());
    }
}
