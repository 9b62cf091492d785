use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::error::FeedError;
use crate::notify::Notifier;
use crate::video::newest;
use crate::youtube::YouTubeClient;

#[derive(Serialize, Deserialize, Default, Debug)]
struct SeenFile {
  #[serde(default)]
  seen_video_ids: Vec<String>,
}

/// Video ids already announced, persisted across launches and wake-ups.
pub struct SeenIdStore {
  path: PathBuf,
}

impl SeenIdStore {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self { path: path.into() }
  }

  /// Missing or unreadable stores load as empty.
  pub async fn load(&self) -> HashSet<String> {
    let content = match tokio::fs::read_to_string(&self.path).await {
      Ok(content) => content,
      Err(e) => {
        if e.kind() != std::io::ErrorKind::NotFound {
          warn!(err = %e, path = %self.path.display(), "seen: failed to read store");
        }
        return HashSet::new();
      }
    };
    match toml::from_str::<SeenFile>(&content) {
      Ok(file) => file.seen_video_ids.into_iter().collect(),
      Err(e) => {
        warn!(err = %e, path = %self.path.display(), "seen: ignoring corrupt store");
        HashSet::new()
      }
    }
  }

  pub async fn save(&self, ids: &HashSet<String>) -> Result<()> {
    let mut seen_video_ids: Vec<String> = ids.iter().cloned().collect();
    seen_video_ids.sort();
    let content = toml::to_string(&SeenFile { seen_video_ids }).context("Failed to serialize seen ids")?;

    if let Some(dir) = self.path.parent() {
      tokio::fs::create_dir_all(dir).await.with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let tmp = self.path.with_extension(format!("toml.{}.tmp", std::process::id()));
    tokio::fs::write(&tmp, content).await.with_context(|| format!("Failed to write {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
      if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
        debug!(err = %cleanup, path = %tmp.display(), "seen: failed to remove temp file");
      }
      return Err(e).with_context(|| format!("Failed to replace {}", self.path.display()));
    }
    Ok(())
  }
}

/// Result of one background wake-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundOutcome {
  /// The channel returned nothing; the store was left alone.
  NoVideos,
  /// The store was updated; `notified` names the announced video, if any.
  Completed { notified: Option<String>, seen: usize },
}

/// One cycle of the periodic background check for new uploads.
pub struct BackgroundRefresher {
  client: Arc<YouTubeClient>,
  store: SeenIdStore,
  notifier: Arc<dyn Notifier>,
  channel_id: String,
  max_results: u32,
  seen_cap: usize,
}

impl BackgroundRefresher {
  pub fn new(
    client: Arc<YouTubeClient>,
    store: SeenIdStore,
    notifier: Arc<dyn Notifier>,
    channel_id: impl Into<String>,
  ) -> Self {
    let c = constants();
    Self {
      client,
      store,
      notifier,
      channel_id: channel_id.into(),
      max_results: c.background_max_results,
      seen_cap: c.seen_ids_cap,
    }
  }

  /// Fetch the latest uploads, alert on the newest unseen one, and record
  /// what was seen. Cancelling `expiration` before the fetch finishes
  /// leaves the store untouched.
  pub async fn run(&self, expiration: &CancellationToken) -> Result<BackgroundOutcome, FeedError> {
    let mut seen = self.store.load().await;
    debug!(known = seen.len(), "seen: background cycle started");

    let videos = tokio::select! {
      biased;
      _ = expiration.cancelled() => {
        info!("seen: background cycle expired during fetch");
        return Err(FeedError::Cancelled);
      }
      result = self.client.fetch_latest_videos(&self.channel_id, self.max_results) => result?,
    };
    if videos.is_empty() {
      return Ok(BackgroundOutcome::NoVideos);
    }
    if expiration.is_cancelled() {
      return Err(FeedError::Cancelled);
    }

    let unseen = videos.iter().filter(|v| !seen.contains(&v.id));
    let fresh = newest(unseen).cloned();
    if let Some(video) = &fresh {
      self.notifier.notify_new_video(video).await;
    }

    seen.extend(videos.iter().take(self.seen_cap).map(|v| v.id.clone()));
    if let Err(e) = self.store.save(&seen).await {
      warn!(err = ?e, "seen: failed to persist seen ids");
    }
    info!(fetched = videos.len(), seen = seen.len(), notified = fresh.is_some(), "seen: background cycle finished");
    Ok(BackgroundOutcome::Completed { notified: fresh.map(|v| v.id), seen: seen.len() })
  }
}
