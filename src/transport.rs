//! An HTTP transport that wraps every request with a timeout boundary and a bounded retry loop.
//!
//! All network traffic of the SDK goes through [`Transport`], so resilience policy lives in one
//! place: callers describe the request and get back either a successful response or a terminal
//! [`TransportError`].
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::TransportError;

/// Resilience policy for [`Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Additional attempts after the first one. `retries = n` means at most `n + 1` requests hit
    /// the wire.
    pub retries: u32,
    /// Backoff floor. Attempt `k` sleeps `min_backoff * 2^k` before retrying.
    pub min_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Per-attempt deadline. When it elapses, the in-flight request is cancelled and the call
    /// fails with [`TransportError::Timeout`].
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> TransportConfig {
        TransportConfig {
            retries: 1,
            min_backoff: Duration::from_millis(1000),
            max_backoff: Duration::from_millis(5000),
            timeout: Duration::from_millis(3000),
        }
    }
}

/// Timeout- and retry-hardened HTTP sender.
pub struct Transport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Transport {
        Transport {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// The underlying client, for callers that need to build requests themselves.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send the request, retrying 503 responses with exponential backoff.
    ///
    /// Outcomes:
    /// - 2xx short-circuits and returns the response.
    /// - Timeout cancels the in-flight request and fails with [`TransportError::Timeout`]; a
    ///   timed-out attempt is never retried.
    /// - 503 is retried up to `retries` extra attempts; exhaustion fails with
    ///   [`TransportError::Retryable`] carrying the last status.
    /// - Any other non-2xx status fails immediately with [`TransportError::NonRetryable`].
    /// - Network-level errors fail with [`TransportError::Unknown`].
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            // Streaming bodies can't be replayed; we only ever send buffered JSON/text.
            let this_attempt = request.try_clone().ok_or(TransportError::NotReplayable)?;

            let result = tokio::time::timeout(self.config.timeout, this_attempt.send()).await;

            let response = match result {
                Err(_elapsed) => {
                    // Dropping the future cancels the in-flight request.
                    log::warn!(target: "attune",
                               attempt,
                               timeout_ms = self.config.timeout.as_millis() as u64;
                               "request aborted by timeout");
                    return Err(TransportError::Timeout);
                }
                Ok(Err(err)) => {
                    log::error!(target: "attune", attempt; "network error: {err}");
                    return Err(TransportError::from(err));
                }
                Ok(Ok(response)) => response,
            };

            let status = response.status();
            if status.is_success() {
                log::debug!(target: "attune",
                            attempt,
                            status = status.as_u16(),
                            url = response.url().as_str();
                            "request succeeded");
                return Ok(response);
            }

            if status == StatusCode::SERVICE_UNAVAILABLE {
                if attempt <= self.config.retries {
                    let delay = self.backoff(attempt);
                    log::debug!(target: "attune",
                                attempt,
                                status = status.as_u16(),
                                delay_ms = delay.as_millis() as u64;
                                "retryable response, backing off");
                    tokio::time::sleep(delay).await;
                    continue;
                }

                log::error!(target: "attune",
                            attempt,
                            status = status.as_u16(),
                            url = response.url().as_str();
                            "retries exhausted");
                return Err(TransportError::Retryable {
                    status: status.as_u16(),
                });
            }

            let trace_id = response
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_owned();
            log::error!(target: "attune",
                        attempt,
                        status = status.as_u16(),
                        trace_id,
                        url = response.url().as_str();
                        "non-retryable response");
            return Err(TransportError::NonRetryable {
                status: status.as_u16(),
            });
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.config.min_backoff.saturating_mul(exp),
            self.config.max_backoff,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(retries: u32) -> Transport {
        Transport::new(TransportConfig {
            retries,
            min_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            timeout: Duration::from_millis(100),
        })
    }

    #[test]
    fn backoff_is_capped() {
        let transport = Transport::new(TransportConfig {
            retries: 10,
            min_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
            timeout: Duration::from_millis(100),
        });

        assert_eq!(transport.backoff(1), Duration::from_millis(200));
        assert_eq!(transport.backoff(2), Duration::from_millis(350));
        assert_eq!(transport.backoff(30), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn unreachable_host_is_unknown_error() {
        let transport = transport(0);
        // Reserved TEST-NET-1 address, nothing listens there.
        let request = transport.client().get("http://192.0.2.1:9/");
        let err = transport.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Unknown(_) | TransportError::Timeout
        ));
    }
}
