// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::config::Config;
use crate::executor::error::{NetworkError, NetworkErrorKind, RequestError};
use crate::executor::traits::ReachabilityObserver;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub cap_delay: Duration,
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.backoff_base_ms),
            cap_delay: Duration::from_millis(config.backoff_cap_ms),
            attempt_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based):
    /// `min(base * 2^(attempt - 1), cap)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        2u32.checked_pow(exponent)
            .and_then(|factor| self.base_delay.checked_mul(factor))
            .map_or(self.cap_delay, |delay| delay.min(self.cap_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            cap_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs requests through a [`Transport`] with bounded retries, exponential
/// backoff and a per-attempt deadline.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    observer: Option<Arc<dyn ReachabilityObserver>>,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ReachabilityObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, RequestError> {
        self.execute_with_attempts(request, self.policy.max_attempts).await
    }

    pub async fn execute_with_attempts(
        &self,
        request: &HttpRequest,
        max_attempts: u32,
    ) -> Result<HttpResponse, RequestError> {
        let max_attempts = max_attempts.max(1);
        let mut last_kind = NetworkErrorKind::Timeout;

        for attempt in 1..=max_attempts {
            let outcome = tokio::time::timeout(self.policy.attempt_timeout, self.transport.send(request)).await;

            let kind = match outcome {
                Ok(Ok(response)) if response.is_success() => {
                    if attempt > 1 {
                        info!(method = %request.method, path = %request.path, attempt, "Request succeeded after retry");
                    }
                    if let Some(observer) = &self.observer {
                        observer.remote_reachable();
                    }
                    return Ok(response);
                }
                Ok(Ok(response)) if response.is_server_error() => NetworkErrorKind::ServerError(response.status),
                // 4xx, plus unexpected 1xx/3xx answers
                Ok(Ok(response)) => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        status = response.status,
                        request_id = %request.request_id,
                        "Request rejected by remote"
                    );
                    return Err(RequestError::Rejected {
                        status: response.status,
                        body: response.body,
                    });
                }
                Ok(Err(TransportError::Aborted)) => {
                    // Cancelled by the caller: neither retried nor a reachability verdict.
                    return Err(NetworkError { kind: NetworkErrorKind::Aborted, attempts: attempt }.into());
                }
                Ok(Err(TransportError::Connection(message))) => NetworkErrorKind::Transport(message),
                Err(_elapsed) => NetworkErrorKind::Timeout,
            };

            warn!(
                method = %request.method,
                path = %request.path,
                attempt,
                max_attempts,
                request_id = %request.request_id,
                error = %kind,
                "Request attempt failed"
            );
            last_kind = kind;

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.backoff_delay(attempt)).await;
            }
        }

        let error = NetworkError {
            kind: last_kind,
            attempts: max_attempts,
        };
        warn!(method = %request.method, path = %request.path, error = %error, "Giving up on request");
        if let Some(observer) = &self.observer {
            observer.remote_unreachable(&error);
        }
        Err(error.into())
    }
}
