//! JSON-over-HTTP transport.
//!
//! Adapters never talk to `reqwest` directly; they hand a payload and an
//! endpoint path to a [`Transport`]. [`HttpTransport`] is the production
//! implementation. Tests substitute scripted transports.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, warn};
use reqwest::header::RETRY_AFTER;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_retry_after::RetryAfterMiddleware;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use easyrag_common::BackendConfig;

use crate::error::{ClientError, ErrorResponse};

/// Sends one JSON payload and returns the parsed JSON reply.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POSTs `payload` to `path`, relative to the backend's base URL.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] for network failures, non-success statuses
    /// and bodies that are not JSON.
    async fn send(&self, path: &str, payload: &Value) -> Result<Value, ClientError>;
}

/// `reqwest` transport with transient-failure retries.
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<Arc<SecretString>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Builds a transport from `config`, falling back to `default_base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be created.
    pub fn new(config: &BackendConfig, default_base_url: &str) -> Result<Self, ClientError> {
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(default_base_url)
            .trim_end_matches('/')
            .to_string();

        url::Url::parse(&base_url).map_err(|e| {
            ClientError::ConfigurationError(format!("Invalid base URL '{base_url}': {e}"))
        })?;

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(
                config.retry_config.initial_delay,
                config.retry_config.max_delay,
            )
            .build_with_max_retries(config.retry_config.max_retries);

        // None means no timeout (useful for slow local models)
        let reqwest_client = match config.timeout_seconds {
            Some(timeout) => reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout))
                .build()?,
            None => reqwest::Client::builder().build()?,
        };

        // NOTE: RetryAfterMiddleware must come before RetryTransientMiddleware
        // so Retry-After headers win over exponential backoff
        let client = reqwest_middleware::ClientBuilder::new(reqwest_client)
            .with(RetryAfterMiddleware::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone().map(Arc::new),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, path: &str, payload: &Value) -> Result<Value, ClientError> {
        let url = self.url_for(path);
        debug!("POST {url}: {payload}");

        let mut request_builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(api_key) = &self.api_key {
            request_builder = request_builder.header(
                "Authorization",
                format!("Bearer {}", api_key.expose_secret()),
            );
        }

        let response = request_builder
            .body(serde_json::to_string(payload)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);

            let error_text = response.text().await.map_err(|e| {
                warn!("Failed to read error response body: {e}");
                ClientError::NetworkError(e)
            })?;

            // Extract the error message from structured response or use raw text
            let error_message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(parsed) => parsed.message().to_string(),
                Err(parse_err) => {
                    debug!("Error body is not structured ({parse_err}), using raw text");
                    error_text
                }
            };

            error!(
                "API request failed with status {}: {}",
                status.as_u16(),
                error_message
            );

            return Err(match status.as_u16() {
                401 => ClientError::AuthenticationError(error_message),
                429 => ClientError::RateLimitError { retry_after },
                code if status.is_server_error() => {
                    ClientError::ServiceUnavailable(format!("{code}: {error_message}"))
                }
                code => ClientError::RequestFailed {
                    status: code,
                    message: error_message,
                },
            });
        }

        let response_text = response.text().await?;
        debug!("Raw API response: {response_text}");
        Ok(serde_json::from_str(&response_text)?)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use easyrag_common::RetryConfig;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(uri: &str) -> BackendConfig {
        BackendConfig::new()
            .with_base_url(uri)
            .with_retry_config(RetryConfig {
                max_retries: 0,
                ..RetryConfig::default()
            })
    }

    #[tokio::test]
    async fn test_posts_json_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({"model": "m"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let reply = transport.send("/api/chat", &json!({"model": "m"})).await.unwrap();

        assert_eq!(reply, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_sends_bearer_token_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(&config(&server.uri()).with_api_key("sk-test"), "http://unused")
                .unwrap();
        transport.send("v1/chat/completions", &json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn test_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Invalid API key", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let err = transport.send("/x", &json!({})).await.unwrap_err();

        assert!(err.is_authentication_error());
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[tokio::test]
    async fn test_rate_limit_error_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "7")
                    .set_body_json(json!({"error": {"message": "Rate limit exceeded"}})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let err = transport.send("/x", &json!({})).await.unwrap_err();

        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[tokio::test]
    async fn test_server_error_is_service_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let err = transport.send("/x", &json!({})).await.unwrap_err();

        assert!(matches!(err, ClientError::ServiceUnavailable(ref m) if m.contains("overloaded")));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_other_status_is_request_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"error": "model 'x' not found"})),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let err = transport.send("/api/chat", &json!({})).await.unwrap_err();

        match err {
            ClientError::RequestFailed { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "model 'x' not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_body_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(&config(&server.uri()), "http://unused").unwrap();
        let err = transport.send("/x", &json!({})).await.unwrap_err();

        assert!(matches!(err, ClientError::SerializationError(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = HttpTransport::new(&BackendConfig::new().with_base_url("not a url"), "x")
            .unwrap_err();
        assert!(matches!(err, ClientError::ConfigurationError(_)));
    }

    #[test]
    fn test_default_base_url_and_debug_redaction() {
        let transport = HttpTransport::new(
            &BackendConfig::new().with_api_key("sk-secret"),
            "http://localhost:11434/",
        )
        .unwrap();

        assert_eq!(transport.base_url(), "http://localhost:11434");
        assert_eq!(transport.url_for("api/chat"), "http://localhost:11434/api/chat");
        assert!(!format!("{transport:?}").contains("sk-secret"));
    }
}
