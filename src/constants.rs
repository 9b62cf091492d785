//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!`, so there is no runtime file
//! I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  pub default_channel_id: String,

  // YouTube Data API
  pub search_endpoint: String,
  pub videos_endpoint: String,
  pub watch_url_base: String,
  pub max_results_limit: u32,
  pub default_max_results: u32,
  pub request_timeout_secs: u64,

  // Retry policy
  pub max_retries: u32,
  pub retry_base_delay_ms: u64,

  // Cache
  pub cache_freshness_secs: i64,

  // Background refresh
  pub background_max_results: u32,
  pub seen_ids_cap: usize,

  // Notifications
  pub notification_title: String,
  pub notification_fallback_body: String,
}

impl Constants {
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }

  pub fn retry_base_delay(&self) -> Duration {
    Duration::from_millis(self.retry_base_delay_ms)
  }

  /// Maximum age of a cached snapshot that may still be served.
  pub fn freshness_window(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.cache_freshness_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
