use std::pin::Pin;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::Stream;
use futures::stream::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::ChatConfig;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS, HEALTH_CHECK_FAILURES,
    HEALTH_CHECKS,
};
use crate::types::ChatRequest;

const CHAT_STREAM_PATH: &str = "api/chat/stream";
const HEALTH_PATH: &str = "health";

/// The raw body of a streamed reply.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens a reply stream for one user submission.
///
/// Implementations make a single attempt.  An `Err` means no body was read
/// and the turn ends with the apology message; errors after that point are
/// items of the returned stream.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Submits `text` and returns the response body.
    async fn submit(&self, text: &str) -> Result<ByteStream>;
}

/// Result of a successful health check.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    /// The `status` field of the response body, when it had one.
    pub status: Option<String>,
    /// Round-trip time of the check.
    pub latency: Duration,
}

/// HTTP client for the chat service.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the configured service.
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let base_url = config.validate()?;
        // No total timeout: it would also bound reading a live reply body.
        let client = ReqwestClient::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {}", e),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
        })
    }

    /// The root every endpoint is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Create and return default headers for chat requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers
    }

    fn map_send_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("Request timed out: {}", e),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::connection(format!("Connection error: {}", e), Some(Box::new(e)))
        } else {
            Error::http_client(format!("Request failed: {}", e), Some(Box::new(e)))
        }
    }

    /// Process error responses and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());

        #[derive(Deserialize)]
        struct ErrorResponse {
            detail: Option<serde_json::Value>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("Failed to read error response: {}", e),
                    Some(Box::new(e)),
                );
            }
        };

        let parsed = serde_json::from_str::<ErrorResponse>(&error_body).ok();
        let error_message = parsed
            .and_then(|e| {
                e.message.or_else(|| {
                    e.detail.map(|detail| match detail {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                })
            })
            .unwrap_or(error_body);

        match status_code {
            400 => Error::bad_request(error_message),
            404 => Error::not_found(error_message),
            408 => Error::request_timeout(error_message),
            429 => Error::rate_limit(error_message, retry_after),
            500 => Error::internal_server(error_message),
            502..=504 => Error::service_unavailable(status_code, error_message, retry_after),
            _ => Error::api(status_code, error_message),
        }
    }

    /// Check whether the chat service is reachable.
    ///
    /// Any non-success status or network failure is an error.  The whole
    /// check is bounded by the configured timeout.
    pub async fn health(&self) -> Result<HealthReport> {
        #[derive(Deserialize)]
        struct HealthBody {
            status: Option<String>,
        }

        HEALTH_CHECKS.click();
        let url = self.endpoint(HEALTH_PATH)?;
        let start = Instant::now();
        let response = match self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                HEALTH_CHECK_FAILURES.click();
                return Err(self.map_send_error(e));
            }
        };

        if !response.status().is_success() {
            HEALTH_CHECK_FAILURES.click();
            return Err(Self::process_error_response(response).await);
        }

        let latency = start.elapsed();
        let status = match response.text().await {
            Ok(body) => serde_json::from_str::<HealthBody>(&body)
                .ok()
                .and_then(|body| body.status),
            Err(e) => {
                debug!("health check body unreadable: {e}");
                None
            }
        };
        debug!(?status, ?latency, "health check succeeded");
        Ok(HealthReport { status, latency })
    }

    /// Send a message and get the streaming reply body.
    ///
    /// The configured timeout bounds connecting only; a reply may stream for
    /// as long as the server keeps it open.
    pub async fn stream(&self, text: &str) -> Result<ByteStream> {
        let url = self.endpoint(CHAT_STREAM_PATH)?;
        let start = Instant::now();
        CLIENT_REQUESTS.click();

        let response = self
            .client
            .post(url)
            .headers(self.default_headers())
            .json(&ChatRequest::new(text))
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                self.map_send_error(e)
            })?;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            warn!("chat request rejected: {err}");
            return Err(err);
        }

        let stream = response.bytes_stream().map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {}", e), Some(Box::new(e)))
            })
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait::async_trait]
impl Transport for ChatClient {
    async fn submit(&self, text: &str) -> Result<ByteStream> {
        self.stream(text).await
    }
}
