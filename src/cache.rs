use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::constants::constants;
use crate::video::Video;

/// The last successfully fetched list and when it was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
  pub videos: Vec<Video>,
  pub saved_at: DateTime<Utc>,
}

impl CacheSnapshot {
  pub fn is_fresh_at(&self, now: DateTime<Utc>, window: chrono::Duration) -> bool {
    now - self.saved_at < window
  }
}

/// JSON snapshot of the video list on disk. Writes replace the file
/// wholesale via rename, so readers never see a partial document.
pub struct CacheStore {
  path: PathBuf,
  clock: Arc<dyn Clock>,
  freshness: chrono::Duration,
}

impl CacheStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self::with_clock(path, Arc::new(SystemClock))
  }

  pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
    Self { path: path.into(), clock, freshness: constants().freshness_window() }
  }

  /// Persist `videos`. Failures are logged, never returned.
  pub async fn save(&self, videos: &[Video]) {
    match self.try_save(videos).await {
      Ok(()) => debug!(count = videos.len(), path = %self.path.display(), "cache: snapshot saved"),
      Err(e) => warn!(err = ?e, "cache: failed to save snapshot"),
    }
  }

  async fn try_save(&self, videos: &[Video]) -> Result<()> {
    let snapshot = CacheSnapshot { videos: videos.to_vec(), saved_at: self.clock.now() };
    let json = serde_json::to_vec(&snapshot).context("Failed to serialize cache snapshot")?;

    if let Some(dir) = self.path.parent() {
      tokio::fs::create_dir_all(dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let tmp = self.path.with_extension(format!("json.{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, &json).await.with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
      if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
        debug!(err = %cleanup, path = %tmp.display(), "cache: failed to remove temp file");
      }
      return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
    }
    Ok(())
  }

  /// The snapshot, if present, well-formed and younger than the freshness window.
  pub async fn load(&self) -> Option<CacheSnapshot> {
    let bytes = match tokio::fs::read(&self.path).await {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        debug!(path = %self.path.display(), "cache: no snapshot");
        return None;
      }
      Err(e) => {
        warn!(err = %e, path = %self.path.display(), "cache: failed to read snapshot");
        return None;
      }
    };

    let snapshot: CacheSnapshot = match serde_json::from_slice(&bytes) {
      Ok(snapshot) => snapshot,
      Err(e) => {
        warn!(err = %e, path = %self.path.display(), "cache: ignoring corrupt snapshot");
        return None;
      }
    };

    if !snapshot.is_fresh_at(self.clock.now(), self.freshness) {
      info!(saved_at = %snapshot.saved_at, "cache: snapshot is stale");
      return None;
    }
    Some(snapshot)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::FixedClock;
  use chrono::TimeZone;

  fn at(minute: u32) -> Arc<dyn Clock> {
    Arc::new(FixedClock(Utc.with_ymd_and_hms(2025, 1, 1, 12, minute, 0).unwrap()))
  }

  fn video(id: &str) -> Video {
    Video {
      id: id.to_string(),
      title: format!("Video {}", id),
      description: String::new(),
      thumbnail_url: Some(format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)),
      published_at: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
      channel_title: Some("Meowbah".to_string()),
      duration_seconds: Some(61),
    }
  }

  #[tokio::test]
  async fn snapshot_saved_29_minutes_ago_is_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    CacheStore::with_clock(&path, at(0)).save(&[video("a"), video("b")]).await;

    let snapshot = CacheStore::with_clock(&path, at(29)).load().await.unwrap();
    let ids: Vec<&str> = snapshot.videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, ["a", "b"]);
    assert_eq!(snapshot.videos[0].duration_seconds, Some(61));
  }

  #[tokio::test]
  async fn snapshot_saved_31_minutes_ago_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    CacheStore::with_clock(&path, at(0)).save(&[video("a")]).await;

    assert!(CacheStore::with_clock(&path, at(31)).load().await.is_none());
  }

  #[tokio::test]
  async fn missing_file_is_no_cache() {
    let dir = tempfile::tempdir().unwrap();
    assert!(CacheStore::new(dir.path().join("absent.json")).load().await.is_none());
  }

  #[tokio::test]
  async fn corrupt_file_is_no_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    std::fs::write(&path, b"{ not json").unwrap();
    assert!(CacheStore::with_clock(&path, at(0)).load().await.is_none());
  }

  #[tokio::test]
  async fn save_creates_parent_and_leaves_no_temp_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.json");
    CacheStore::with_clock(&path, at(0)).save(&[video("a")]).await;

    let names: Vec<String> = std::fs::read_dir(path.parent().unwrap())
      .unwrap()
      .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
      .collect();
    assert_eq!(names, ["cache.json"]);
  }

  #[tokio::test]
  async fn save_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    // A directory where the file should be makes the rename fail.
    let path = dir.path().join("cache.json");
    std::fs::create_dir(&path).unwrap();
    CacheStore::with_clock(&path, at(0)).save(&[video("a")]).await;
    assert!(CacheStore::with_clock(&path, at(0)).load().await.is_none());
  }
}
