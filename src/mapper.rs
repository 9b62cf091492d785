use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::duration::parse_iso_duration;
use crate::video::{Video, sort_by_published_desc};
use crate::youtube::{SearchItem, SearchResponse, Thumbnails, VideosResponse};

const UNTITLED: &str = "Untitled";

/// Highest-resolution thumbnail URL: maxres > standard > high > medium > default.
pub fn best_thumbnail(thumbs: Option<&Thumbnails>) -> Option<String> {
  let thumbs = thumbs?;
  [&thumbs.maxres, &thumbs.standard, &thumbs.high, &thumbs.medium, &thumbs.default]
    .into_iter()
    .filter_map(|t| t.as_ref().and_then(|t| t.url.as_deref()))
    .find(|url| !url.is_empty())
    .map(str::to_string)
}

/// RFC 3339 timestamps, with or without fractional seconds.
pub fn parse_published_at(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s.trim()).ok().map(|d| d.with_timezone(&Utc))
}

fn video_id(item: &SearchItem) -> Option<&str> {
  item.id.video_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
}

/// Distinct playable ids in search order.
pub fn candidate_ids(search: &SearchResponse) -> Vec<String> {
  let mut seen = HashSet::new();
  search.items.iter().filter_map(video_id).filter(|id| seen.insert(*id)).map(str::to_string).collect()
}

/// Duration per video id. Items without a duration are left out.
pub fn duration_map(details: &VideosResponse) -> HashMap<String, u64> {
  details
    .items
    .iter()
    .filter_map(|item| {
      let duration = item.content_details.as_ref()?.duration.as_deref()?;
      Some((item.id.clone(), parse_iso_duration(duration)))
    })
    .collect()
}

fn map_item(item: &SearchItem) -> Option<Video> {
  let id = video_id(item)?;
  let snippet = &item.snippet;
  Some(Video {
    id: id.to_string(),
    title: snippet.title.clone().unwrap_or_else(|| UNTITLED.to_string()),
    description: snippet.description.clone().unwrap_or_default(),
    thumbnail_url: best_thumbnail(snippet.thumbnails.as_ref()),
    published_at: snippet.published_at.as_deref().and_then(parse_published_at),
    channel_title: snippet.channel_title.clone(),
    duration_seconds: None,
  })
}

/// Build the canonical list: drop items without a video id, dedupe by id,
/// attach durations, sort newest first.
pub fn map_videos(search: &SearchResponse, durations: &HashMap<String, u64>) -> Vec<Video> {
  let mut seen = HashSet::new();
  let mut videos: Vec<Video> = search
    .items
    .iter()
    .filter_map(map_item)
    .filter(|v| seen.insert(v.id.clone()))
    .map(|v| {
      let duration = durations.get(&v.id).copied();
      v.with_duration(duration)
    })
    .collect();
  sort_by_published_desc(&mut videos);
  videos
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn search(json: &str) -> SearchResponse {
    serde_json::from_str(json).unwrap()
  }

  #[test]
  fn item_without_video_id_is_dropped() {
    let search = search(
      r#"{"items":[
        {"id":{"kind":"youtube#channel"},"snippet":{"title":"channel"}},
        {"id":{"kind":"youtube#video","videoId":""},"snippet":{"title":"blank"}},
        {"id":{"kind":"youtube#video","videoId":"v1"},"snippet":{"title":"real"}}
      ]}"#,
    );
    let videos = map_videos(&search, &HashMap::new());
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0].id, "v1");
    assert_eq!(candidate_ids(&search), ["v1"]);
  }

  #[test]
  fn only_default_thumbnail_is_used() {
    let search = search(
      r#"{"items":[{"id":{"videoId":"v1"},"snippet":{"thumbnails":{"default":{"url":"https://i.ytimg.com/d.jpg"}}}}]}"#,
    );
    let videos = map_videos(&search, &HashMap::new());
    assert_eq!(videos[0].thumbnail_url.as_deref(), Some("https://i.ytimg.com/d.jpg"));
  }

  #[test]
  fn maxres_beats_default() {
    let search = search(
      r#"{"items":[{"id":{"videoId":"v1"},"snippet":{"thumbnails":{
        "default":{"url":"https://i.ytimg.com/d.jpg"},
        "maxres":{"url":"https://i.ytimg.com/max.jpg","width":1280,"height":720}
      }}}]}"#,
    );
    let videos = map_videos(&search, &HashMap::new());
    assert_eq!(videos[0].thumbnail_url.as_deref(), Some("https://i.ytimg.com/max.jpg"));
  }

  #[test]
  fn missing_thumbnails_and_fields_degrade() {
    let search = search(r#"{"items":[{"id":{"videoId":"v1"},"snippet":{}}]}"#);
    let videos = map_videos(&search, &HashMap::new());
    let v = &videos[0];
    assert_eq!(v.title, "Untitled");
    assert_eq!(v.description, "");
    assert_eq!(v.thumbnail_url, None);
    assert_eq!(v.published_at, None);
    assert_eq!(v.duration_seconds, None);
  }

  #[test]
  fn sorted_newest_first_with_undated_last() {
    let search = search(
      r#"{"items":[
        {"id":{"videoId":"jan"},"snippet":{"publishedAt":"2024-01-01T00:00:00Z"}},
        {"id":{"videoId":"none"},"snippet":{}},
        {"id":{"videoId":"jun"},"snippet":{"publishedAt":"2024-06-01T00:00:00.000Z"}}
      ]}"#,
    );
    let ids: Vec<String> = map_videos(&search, &HashMap::new()).into_iter().map(|v| v.id).collect();
    assert_eq!(ids, ["jun", "jan", "none"]);
  }

  #[test]
  fn durations_attached_by_id() {
    let search = search(r#"{"items":[{"id":{"videoId":"a"},"snippet":{}},{"id":{"videoId":"b"},"snippet":{}}]}"#);
    let details: VideosResponse = serde_json::from_str(
      r#"{"items":[{"id":"a","contentDetails":{"duration":"PT4M13S"}},{"id":"c","contentDetails":{"duration":"PT1S"}}]}"#,
    )
    .unwrap();
    let durations = duration_map(&details);
    let videos = map_videos(&search, &durations);
    let a = videos.iter().find(|v| v.id == "a").unwrap();
    let b = videos.iter().find(|v| v.id == "b").unwrap();
    assert_eq!(a.duration_seconds, Some(253));
    assert_eq!(b.duration_seconds, None);
  }

  #[test]
  fn duplicate_ids_collapse() {
    let search = search(r#"{"items":[{"id":{"videoId":"a"},"snippet":{}},{"id":{"videoId":"a"},"snippet":{}}]}"#);
    assert_eq!(map_videos(&search, &HashMap::new()).len(), 1);
    assert_eq!(candidate_ids(&search).len(), 1);
  }

  #[test]
  fn published_at_parsing() {
    let expected = Utc.with_ymd_and_hms(2025, 8, 25, 12, 30, 0).unwrap();
    assert_eq!(parse_published_at("2025-08-25T12:30:00Z"), Some(expected));
    assert_eq!(parse_published_at("2025-08-25T13:30:00+01:00"), Some(expected));
    assert!(parse_published_at("2025-08-25T12:30:00.250Z").is_some());
    assert_eq!(parse_published_at("yesterday"), None);
  }
}
