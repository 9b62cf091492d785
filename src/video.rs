use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use crate::constants::constants;
use crate::duration::format_duration;

/// A playable upload from the channel. Identity is the video id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
  pub id: String,
  pub title: String,
  pub description: String,
  pub thumbnail_url: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub channel_title: Option<String>,
  pub duration_seconds: Option<u64>,
}

impl PartialEq for Video {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for Video {}

impl Hash for Video {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.id.hash(state);
  }
}

impl Video {
  pub fn with_duration(self, duration_seconds: Option<u64>) -> Self {
    Self { duration_seconds, ..self }
  }

  /// `H:MM:SS` / `M:SS`, or empty while the duration is unknown.
  pub fn formatted_duration(&self) -> String {
    self.duration_seconds.map(format_duration).unwrap_or_default()
  }

  pub fn watch_url(&self) -> String {
    format!("{}{}", constants().watch_url_base, self.id)
  }

  pub fn published_label(&self) -> String {
    self.published_at.map(|d| d.format("%b %-d, %Y %H:%M").to_string()).unwrap_or_default()
  }

  /// Undated videos sort as the oldest possible.
  fn publish_key(&self) -> DateTime<Utc> {
    self.published_at.unwrap_or(DateTime::<Utc>::MIN_UTC)
  }
}

/// Newest first; videos without a publish date go last. Stable.
pub fn sort_by_published_desc(videos: &mut [Video]) {
  videos.sort_by_key(|v| std::cmp::Reverse(v.publish_key()));
}

/// Pick the most recently published video, if any.
pub fn newest<'a>(videos: impl IntoIterator<Item = &'a Video>) -> Option<&'a Video> {
  videos.into_iter().fold(None, |best: Option<&Video>, v| match best {
    Some(b) if b.publish_key() >= v.publish_key() => Some(b),
    _ => Some(v),
  })
}

/// Display ordering for a video list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
  Name,
  #[default]
  Date,
  Duration {
    ascending: bool,
  },
}

impl SortOrder {
  pub fn from_config(s: &str, ascending: bool) -> Self {
    match s.to_lowercase().as_str() {
      "name" | "title" => SortOrder::Name,
      "duration" | "length" => SortOrder::Duration { ascending },
      _ => SortOrder::Date,
    }
  }

  fn compare(self, a: &Video, b: &Video) -> Ordering {
    match self {
      SortOrder::Name => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
      SortOrder::Date => b.publish_key().cmp(&a.publish_key()),
      SortOrder::Duration { ascending } => {
        let l = a.duration_seconds.unwrap_or(u64::MAX);
        let r = b.duration_seconds.unwrap_or(u64::MAX);
        if ascending { l.cmp(&r) } else { r.cmp(&l) }
      }
    }
  }
}

/// Case-insensitive match against title or description.
pub fn matches_filter(video: &Video, filter: &str) -> bool {
  if filter.is_empty() {
    return true;
  }
  let needle = filter.to_lowercase();
  video.title.to_lowercase().contains(&needle) || video.description.to_lowercase().contains(&needle)
}

/// Filter then sort a list for display, leaving the input untouched.
pub fn arrange(videos: &[Video], filter: &str, order: SortOrder) -> Vec<Video> {
  let mut out: Vec<Video> = videos.iter().filter(|v| matches_filter(v, filter)).cloned().collect();
  out.sort_by(|a, b| order.compare(a, b));
  out
}
