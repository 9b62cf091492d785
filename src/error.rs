use serde::Deserialize;
use thiserror::Error;

/// Network-level failure of a single HTTP attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
  #[error("request timed out")]
  Timeout,

  #[error("could not resolve host: {0}")]
  Dns(String),

  #[error("host unreachable: {0}")]
  HostUnreachable(String),

  #[error("network connection was lost: {0}")]
  ConnectionLost(String),

  #[error("not connected to the internet")]
  Offline,

  #[error("invalid request URL: {0}")]
  InvalidUrl(String),

  #[error("protocol error: {0}")]
  Protocol(String),
}

impl TransportError {
  /// Whether retrying the same request could plausibly succeed.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      TransportError::Timeout
        | TransportError::Dns(_)
        | TransportError::HostUnreachable(_)
        | TransportError::ConnectionLost(_)
        | TransportError::Offline
    )
  }
}

/// Structured error returned by the API with a non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
  pub http_status: u16,
  pub code: i64,
  pub message: String,
  pub reason: Option<String>,
  pub status: Option<String>,
}

impl ApiError {
  /// Build from a non-2xx response body. Bodies that don't carry the
  /// `{"error": {...}}` envelope still yield an error keyed on the HTTP status.
  pub fn from_response(http_status: u16, body: &str) -> Self {
    #[derive(Deserialize)]
    struct Envelope {
      error: ErrorBody,
    }

    #[derive(Deserialize)]
    struct ErrorBody {
      code: Option<i64>,
      message: Option<String>,
      #[serde(default)]
      errors: Vec<ErrorItem>,
      status: Option<String>,
    }

    #[derive(Deserialize)]
    struct ErrorItem {
      reason: Option<String>,
    }

    match serde_json::from_str::<Envelope>(body) {
      Ok(Envelope { error }) => ApiError {
        http_status,
        code: error.code.unwrap_or(i64::from(http_status)),
        message: error.message.unwrap_or_else(|| format!("HTTP {}", http_status)),
        reason: error.errors.into_iter().find_map(|e| e.reason),
        status: error.status,
      },
      Err(_) => {
        let snippet: String = body.trim().chars().take(200).collect();
        ApiError {
          http_status,
          code: i64::from(http_status),
          message: if snippet.is_empty() { format!("HTTP {}", http_status) } else { snippet },
          reason: None,
          status: None,
        }
      }
    }
  }

  /// 403 or any quota marker in reason, status or message.
  pub fn is_quota_exceeded(&self) -> bool {
    if self.code == 403 {
      return true;
    }
    let mentions_quota = |s: &str| s.to_ascii_lowercase().contains("quota");
    self.reason.as_deref().is_some_and(mentions_quota)
      || self.status.as_deref().is_some_and(mentions_quota)
      || mentions_quota(&self.message)
  }
}

impl std::fmt::Display for ApiError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "API error {}: {}", self.code, self.message)?;
    if let Some(reason) = &self.reason {
      write!(f, " (reason: {})", reason)?;
    }
    if let Some(status) = &self.status {
      write!(f, " (status: {})", status)?;
    }
    Ok(())
  }
}

impl std::error::Error for ApiError {}

/// Everything that can abort a refresh cycle.
#[derive(Debug, Error)]
pub enum FeedError {
  #[error("network error: {0}")]
  Transport(#[from] TransportError),

  #[error(transparent)]
  Api(#[from] ApiError),

  #[error("failed to decode {endpoint} response at '{path}': {source}")]
  Decode {
    endpoint: &'static str,
    path: String,
    source: serde_json::Error,
  },

  #[error("refresh cancelled")]
  Cancelled,
}

impl FeedError {
  pub fn is_quota_exceeded(&self) -> bool {
    matches!(self, FeedError::Api(e) if e.is_quota_exceeded())
  }

  pub fn is_transient(&self) -> bool {
    matches!(self, FeedError::Transport(e) if e.is_transient())
  }
}
