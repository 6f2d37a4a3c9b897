use std::{fmt, sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};

use crate::{
    error::is_retryable_status,
    request::UpstreamResponse,
    transport::{ReqwestTransport, Transport},
    ClientOptions, OutboundRequest, RelayError, Result,
};

/// Final result of forwarding one [`OutboundRequest`].
pub type CallOutcome = Result<UpstreamResponse>;

/// Executes outbound calls against an unreliable upstream, retrying
/// rate-limited, server-side and transport failures with exponential backoff.
#[derive(Clone)]
pub struct Forwarder {
    transport: Arc<dyn Transport>,
    options: ClientOptions,
}

impl fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Forwarder")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for Forwarder {
    fn default() -> Self {
        Self::new(ClientOptions::default())
    }
}

impl Forwarder {
    /// Creates a forwarder backed by a fresh `reqwest` client.
    pub fn new(options: ClientOptions) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::default()), options)
    }

    /// Creates a forwarder that performs attempts through `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>, options: ClientOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Executes `request` and returns exactly one outcome.
    ///
    /// 2xx responses are returned as success. 429, 5xx and transport failures
    /// are retried until the policy's attempt budget is spent, then reported as
    /// [`RelayError::RetriesExhausted`]. Every other status is a terminal
    /// [`RelayError::Http`] on the attempt it was received. When the deadline
    /// elapses first, [`RelayError::DeadlineExceeded`] carries the last
    /// retryable failure seen so far.
    pub async fn execute(&self, request: &OutboundRequest) -> CallOutcome {
        let mut last_failure = None;
        let Some(deadline_ms) = self.options.deadline_ms else {
            return self.execute_with_retry(request, &mut last_failure).await;
        };

        let bounded = timeout(
            Duration::from_millis(deadline_ms),
            self.execute_with_retry(request, &mut last_failure),
        )
        .await;
        match bounded {
            Ok(outcome) => outcome,
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    url = request.url(),
                    deadline_ms,
                    "upstream request deadline elapsed"
                );

                Err(RelayError::DeadlineExceeded {
                    deadline_ms,
                    last: last_failure.map(Box::new),
                })
            }
        }
    }

    async fn execute_with_retry(
        &self,
        request: &OutboundRequest,
        last_failure: &mut Option<RelayError>,
    ) -> CallOutcome {
        let policy = &self.options.retry;
        let max_attempts = policy.attempts();
        let attempt_timeout = Duration::from_millis(self.options.timeout_ms);
        let mut attempt = 1u32;

        loop {
            let failure = match self.transport.send(request, attempt_timeout).await {
                Ok(response) if response.status.is_success() => return Ok(response),
                Ok(response) if is_retryable_status(response.status.as_u16()) => {
                    response.into_http_error()
                }
                Ok(response) => return Err(response.into_http_error()),
                Err(err) if err.is_retryable() => RelayError::Transport(err),
                Err(err) => return Err(RelayError::Transport(err)),
            };

            if attempt >= max_attempts {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    url = request.url(),
                    attempts = attempt,
                    "giving up on upstream request: {failure}"
                );

                return Err(RelayError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(failure),
                });
            }

            let delay = policy.delay_after(attempt);

            #[cfg(feature = "tracing")]
            tracing::debug!(
                url = request.url(),
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                "retrying upstream request: {failure}"
            );

            *last_failure = Some(failure);
            sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::Forwarder;
    use crate::{
        request::UpstreamResponse, transport::Transport, ClientOptions, OutboundRequest,
        RelayError, RetryPolicy, TransportError, TransportErrorKind,
    };

    struct Scripted {
        statuses: Mutex<Vec<u16>>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(
            &self,
            _request: &OutboundRequest,
            _timeout: std::time::Duration,
        ) -> Result<UpstreamResponse, TransportError> {
            *self.calls.lock().expect("calls mutex") += 1;
            let status = {
                let mut statuses = self.statuses.lock().expect("statuses mutex");
                if statuses.is_empty() {
                    0
                } else {
                    statuses.remove(0)
                }
            };
            if status == 0 {
                return Err(TransportError::new(
                    TransportErrorKind::Connect,
                    "connection refused",
                ));
            }
            let status = StatusCode::from_u16(status).expect("valid status");
            Ok(UpstreamResponse::new(status, "{}"))
        }
    }

    fn forwarder(statuses: Vec<u16>, max_attempts: u32) -> (Forwarder, Arc<Scripted>) {
        let transport = Arc::new(Scripted {
            statuses: Mutex::new(statuses),
            calls: Mutex::new(0),
        });
        let options = ClientOptions::default().with_retry(RetryPolicy {
            max_attempts,
            initial_delay_ms: 1,
            backoff_multiplier: 2.0,
            max_delay_ms: None,
        });
        (
            Forwarder::with_transport(transport.clone(), options),
            transport,
        )
    }

    fn request() -> OutboundRequest {
        OutboundRequest::new(reqwest::Method::POST, "http://upstream.test/generate")
    }

    #[tokio::test]
    async fn redirect_status_is_terminal_failure() {
        let (forwarder, transport) = forwarder(vec![304, 200], 3);
        let err = forwarder.execute(&request()).await.expect_err("304 is not success");
        assert!(matches!(err, RelayError::Http { status: 304, .. }));
        assert_eq!(*transport.calls.lock().expect("calls mutex"), 1);
    }

    #[tokio::test]
    async fn builder_failure_is_not_retried() {
        struct Broken;

        #[async_trait]
        impl Transport for Broken {
            async fn send(
                &self,
                _request: &OutboundRequest,
                _timeout: std::time::Duration,
            ) -> Result<UpstreamResponse, TransportError> {
                Err(TransportError::new(TransportErrorKind::Builder, "relative URL"))
            }
        }

        let forwarder = Forwarder::with_transport(Arc::new(Broken), ClientOptions::default());
        let err = forwarder.execute(&request()).await.expect_err("must fail");
        assert!(matches!(err, RelayError::Transport(ref e) if !e.is_retryable()));
    }

    #[tokio::test]
    async fn single_attempt_policy_still_annotates_exhaustion() {
        let (forwarder, transport) = forwarder(vec![500], 1);
        let err = forwarder.execute(&request()).await.expect_err("500 must fail");
        assert!(matches!(err, RelayError::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(*transport.calls.lock().expect("calls mutex"), 1);
    }

    #[test]
    fn debug_hides_transport() {
        let (forwarder, _) = forwarder(vec![], 2);
        let debug = format!("{forwarder:?}");
        assert!(debug.starts_with("Forwarder"));
        assert!(debug.contains("max_attempts: 2"));
    }
}
