//! reqwest-backed transport with per-request timeout and bounded retry.

use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tracing::debug;

use crate::config::TransportConfig;
use crate::metrics::{TRANSPORT_REQUESTS, TRANSPORT_RETRIES};

use super::{RequestSpec, Response, RetryPolicy, TransportError};

/// HTTP transport that retries transient failures.
///
/// GET is always safe to retry. POST is retried too because the publish
/// endpoint has behaved idempotently for this workload; a retried publish
/// whose first attempt actually landed would create a duplicate asset.
#[derive(Clone)]
pub struct RetryingTransport {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingTransport {
    /// Create a transport from configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        Self::with_policy(config.timeout(), RetryPolicy::from_config(config))
    }

    /// Create a transport with an explicit timeout and retry policy.
    pub fn with_policy(timeout: Duration, policy: RetryPolicy) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        Ok(Self { client, policy })
    }

    /// Same client and timeout, single attempt.
    pub fn without_retry(&self) -> Self {
        Self {
            client: self.client.clone(),
            policy: RetryPolicy::no_retry(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send a request, retrying per the policy.
    pub async fn request(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let label = format!("{} {}", spec.method, strip_query(&spec.url));
        let method = spec.method.as_str();

        let result = self
            .policy
            .run(&label, |attempt| {
                if attempt > 1 {
                    TRANSPORT_RETRIES.with_label_values(&[method]).inc();
                }
                self.send_once(spec)
            })
            .await;

        let status = if result.is_ok() { "success" } else { "error" };
        TRANSPORT_REQUESTS
            .with_label_values(&[method, status])
            .inc();

        result
    }

    /// A single attempt, no retry.
    async fn send_once(&self, spec: &RequestSpec) -> Result<Response, TransportError> {
        let mut builder = self.client.request(spec.method.clone(), &spec.url);

        for (name, value) in &spec.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            builder = builder.header(name, value);
        }

        if let Some(body) = &spec.body {
            builder = builder.body(body.clone());
        } else if spec.method == Method::POST {
            // Some endpoints reject a POST without an explicit length
            builder = builder.body(Vec::new());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?
            .to_vec();

        debug!(url = %strip_query(&spec.url), status, bytes = body.len(), "Response received");

        if response_accepted(status, &spec.accept_status) {
            Ok(Response {
                status,
                headers,
                body,
            })
        } else {
            Err(TransportError::from_status(
                status,
                &String::from_utf8_lossy(&body),
            ))
        }
    }
}

fn response_accepted(status: u16, accept_status: &[u16]) -> bool {
    (200..300).contains(&status) || accept_status.contains(&status)
}

/// Query strings can carry ids in bulk; keep them out of log lines.
fn strip_query(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
