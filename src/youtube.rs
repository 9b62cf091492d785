use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::constants;
use crate::error::{ApiError, FeedError, TransportError};
use crate::http::{RetryPolicy, Transport, fetch_with_retry};
use crate::mapper::{candidate_ids, duration_map, map_videos};
use crate::video::Video;

// --- Search endpoint payload ---

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  pub items: Vec<SearchItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchItem {
  #[serde(default)]
  pub id: SearchItemId,
  #[serde(default)]
  pub snippet: Snippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchItemId {
  pub kind: Option<String>,
  pub video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
  pub published_at: Option<String>,
  pub channel_id: Option<String>,
  pub title: Option<String>,
  pub description: Option<String>,
  pub thumbnails: Option<Thumbnails>,
  pub channel_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
  pub default: Option<Thumbnail>,
  pub medium: Option<Thumbnail>,
  pub high: Option<Thumbnail>,
  pub standard: Option<Thumbnail>,
  pub maxres: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnail {
  pub url: Option<String>,
  pub width: Option<u32>,
  pub height: Option<u32>,
}

// --- Videos endpoint payload (durations) ---

#[derive(Debug, Deserialize)]
pub struct VideosResponse {
  pub items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
  pub id: String,
  pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Deserialize)]
pub struct ContentDetails {
  /// ISO-8601 duration, e.g. `PT4M13S`.
  pub duration: Option<String>,
}

/// Clamp a requested page size into what the API accepts.
pub fn clamp_max_results(max_results: u32) -> u32 {
  max_results.clamp(1, constants().max_results_limit)
}

fn decode<T: DeserializeOwned>(endpoint: &'static str, body: &str) -> Result<T, FeedError> {
  let deserializer = &mut serde_json::Deserializer::from_str(body);
  serde_path_to_error::deserialize(deserializer).map_err(|e| FeedError::Decode {
    endpoint,
    path: e.path().to_string(),
    source: e.into_inner(),
  })
}

fn parse_endpoint(raw: &str) -> Result<Url, FeedError> {
  Url::parse(raw).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", raw, e)).into())
}

/// Thin client over the YouTube Data API search and videos endpoints.
pub struct YouTubeClient {
  transport: Arc<dyn Transport>,
  api_key: String,
  retry: RetryPolicy,
  search_endpoint: Url,
  videos_endpoint: Url,
}

impl YouTubeClient {
  pub fn new(transport: Arc<dyn Transport>, api_key: impl Into<String>) -> Result<Self, FeedError> {
    Ok(Self {
      transport,
      api_key: api_key.into(),
      retry: RetryPolicy::default(),
      search_endpoint: parse_endpoint(&constants().search_endpoint)?,
      videos_endpoint: parse_endpoint(&constants().videos_endpoint)?,
    })
  }

  pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn search_url(&self, channel_id: &str, max_results: u32) -> Url {
    let mut url = self.search_endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("key", &self.api_key)
      .append_pair("channelId", channel_id)
      .append_pair("maxResults", &clamp_max_results(max_results).to_string())
      .append_pair("order", "date")
      .append_pair("type", "video")
      .append_pair("part", "snippet");
    url
  }

  pub fn videos_url(&self, ids: &[String]) -> Url {
    let mut url = self.videos_endpoint.clone();
    url
      .query_pairs_mut()
      .append_pair("key", &self.api_key)
      .append_pair("id", &ids.join(","))
      .append_pair("part", "contentDetails");
    url
  }

  async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str, url: &Url) -> Result<T, FeedError> {
    let response = fetch_with_retry(self.transport.as_ref(), url, &self.retry).await?;
    if !response.is_success() {
      return Err(ApiError::from_response(response.status, &response.body).into());
    }
    decode(endpoint, &response.body)
  }

  /// Most recent uploads of `channel_id`, newest first by the API's ordering.
  pub async fn search_latest(&self, channel_id: &str, max_results: u32) -> Result<SearchResponse, FeedError> {
    self.get_json("search", &self.search_url(channel_id, max_results)).await
  }

  /// Duration in seconds per id, for the ids the API knows about.
  pub async fn video_durations(&self, ids: &[String]) -> Result<HashMap<String, u64>, FeedError> {
    let details: VideosResponse = self.get_json("videos", &self.videos_url(ids)).await?;
    Ok(duration_map(&details))
  }

  /// Search, then fetch durations for the hits, then map to the canonical list.
  pub async fn fetch_latest_videos(&self, channel_id: &str, max_results: u32) -> Result<Vec<Video>, FeedError> {
    let search = self.search_latest(channel_id, max_results).await?;
    let ids = candidate_ids(&search);
    if ids.is_empty() {
      info!(channel_id, "feed: search returned no videos");
      return Ok(Vec::new());
    }
    debug!(count = ids.len(), "feed: fetching durations");
    let durations = self.video_durations(&ids).await?;
    Ok(map_videos(&search, &durations))
  }
}
