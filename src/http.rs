use async_trait::async_trait;
use reqwest::{Client, Url};
use std::error::Error as _;
use std::io::ErrorKind;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::constants;
use crate::error::TransportError;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub body: String,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }
}

/// One-shot HTTP GET. Implementations never retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError>;
}

/// `Transport` backed by a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
  client: Client,
}

impl ReqwestTransport {
  pub fn new() -> Result<Self, TransportError> {
    let client = Client::builder()
      .timeout(constants().request_timeout())
      .user_agent(concat!("meowfeed/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| TransportError::Protocol(e.to_string()))?;
    Ok(Self { client })
  }

  pub fn with_client(client: Client) -> Self {
    Self { client }
  }

  pub fn client(&self) -> &Client {
    &self.client
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    let response = self.client.get(url.clone()).send().await.map_err(|e| classify_reqwest_error(&e))?;
    let status = response.status().as_u16();
    // A body cut off mid-read counts as a lost connection.
    let body = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
    Ok(HttpResponse { status, body })
  }
}

/// Map a reqwest failure onto the transport error kinds the retry loop understands.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
  if err.is_timeout() {
    return TransportError::Timeout;
  }
  if err.is_builder() {
    return TransportError::InvalidUrl(err.to_string());
  }

  let mut source = err.source();
  while let Some(cause) = source {
    if let Some(io) = cause.downcast_ref::<std::io::Error>()
      && let Some(kind) = classify_io_kind(io.kind(), io.to_string())
    {
      return kind;
    }
    let text = cause.to_string().to_ascii_lowercase();
    if text.contains("dns error") || text.contains("failed to lookup address") || text.contains("name or service not known")
    {
      return TransportError::Dns(cause.to_string());
    }
    source = cause.source();
  }

  // Connect errors without a network io kind underneath are TLS or handshake failures.
  if err.is_body() {
    return TransportError::ConnectionLost(err.to_string());
  }
  TransportError::Protocol(err.to_string())
}

fn classify_io_kind(kind: ErrorKind, message: String) -> Option<TransportError> {
  match kind {
    ErrorKind::TimedOut => Some(TransportError::Timeout),
    ErrorKind::NetworkDown | ErrorKind::NetworkUnreachable => Some(TransportError::Offline),
    ErrorKind::HostUnreachable | ErrorKind::ConnectionRefused => Some(TransportError::HostUnreachable(message)),
    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe | ErrorKind::UnexpectedEof => {
      Some(TransportError::ConnectionLost(message))
    }
    _ => None,
  }
}

/// Bounded exponential backoff: `base_delay * 2^attempt` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub base_delay: Duration,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: constants().max_retries, base_delay: constants().retry_base_delay() }
  }
}

impl RetryPolicy {
  /// Delay before retry number `attempt + 1` (0-based).
  pub fn delay_for(&self, attempt: u32) -> Duration {
    self.base_delay.saturating_mul(1u32 << attempt.min(16))
  }
}

/// GET `url`, retrying transient failures per `policy`. Returns the last
/// error once retries are exhausted; non-transient errors return at once.
pub async fn fetch_with_retry(
  transport: &dyn Transport,
  url: &Url,
  policy: &RetryPolicy,
) -> Result<HttpResponse, TransportError> {
  let mut attempt = 0;
  loop {
    match transport.get(url).await {
      Ok(response) => {
        debug!(path = url.path(), status = response.status, attempt, "http: response received");
        return Ok(response);
      }
      Err(e) if e.is_transient() && attempt < policy.max_retries => {
        let delay = policy.delay_for(attempt);
        warn!(path = url.path(), attempt, delay_ms = delay.as_millis() as u64, err = %e, "http: transient failure, retrying");
        tokio::time::sleep(delay).await;
        attempt += 1;
      }
      Err(e) => {
        warn!(path = url.path(), attempt, err = %e, "http: request failed");
        return Err(e);
      }
    }
  }
}
