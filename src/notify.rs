use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::video::Video;

/// Receives the single "new video available" signal of a refresh cycle.
/// Delivery, permissions and display are the implementor's business.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn notify_new_video(&self, video: &Video);
}

/// User-visible content of a new-video alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideoAlert {
  pub identifier: String,
  pub title: String,
  pub body: String,
}

impl NewVideoAlert {
  pub fn for_video(video: &Video) -> Self {
    let c = constants();
    let body = if video.title.is_empty() {
      c.notification_fallback_body.clone()
    } else {
      format!("“{}” is ready to watch. Tap to play!", video.title)
    };
    Self { identifier: format!("new-video-{}", video.id), title: c.notification_title.clone(), body }
  }
}

/// Prints alerts to the terminal, then prefetches the thumbnail in the background.
///
/// Thumbnail downloads die with the runtime; a short-lived process should
/// call [`ConsoleNotifier::settle`] before exiting.
pub struct ConsoleNotifier {
  http_client: Client,
  attachments: TaskTracker,
}

impl ConsoleNotifier {
  pub fn new(http_client: Client) -> Self {
    Self { http_client, attachments: TaskTracker::new() }
  }

  /// Wait up to `grace` for pending thumbnail downloads. Returns false if some were still running.
  pub async fn settle(&self, grace: Duration) -> bool {
    self.attachments.close();
    let pending = self.attachments.len();
    if pending == 0 {
      return true;
    }
    debug!(pending, "notify: waiting for thumbnail downloads");
    let done = tokio::time::timeout(grace, self.attachments.wait()).await.is_ok();
    if !done {
      info!(pending = self.attachments.len(), "notify: abandoning thumbnail downloads");
    }
    done
  }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
  async fn notify_new_video(&self, video: &Video) {
    let alert = NewVideoAlert::for_video(video);
    info!(id = %alert.identifier, "notify: new video alert");
    println!("🔔 {}\n   {}\n   {}", alert.title, alert.body, video.watch_url());

    // The alert above never waits on this.
    if let Some(url) = video.thumbnail_url.clone() {
      let client = self.http_client.clone();
      let video_id = video.id.clone();
      self.attachments.spawn(async move {
        match fetch_thumbnail_attachment(&client, &url, &video_id).await {
          Ok(path) => debug!(path = %path.display(), "notify: thumbnail attached"),
          Err(e) => warn!(err = %e, "notify: thumbnail attachment failed"),
        }
      });
    }
  }
}

/// Download a thumbnail into the temp dir as `thumb-<id>.jpg`.
pub async fn fetch_thumbnail_attachment(client: &Client, url: &str, video_id: &str) -> Result<PathBuf> {
  let response = client
    .get(url)
    .header(ACCEPT, "image/*")
    .send()
    .await
    .with_context(|| format!("Failed to request thumbnail {}", url))?;
  if !response.status().is_success() {
    return Err(anyhow!("Thumbnail request returned {}", response.status()));
  }
  let bytes = response.bytes().await.with_context(|| format!("Failed to read thumbnail bytes from {}", url))?;
  let path = std::env::temp_dir().join(format!("thumb-{}.jpg", video_id));
  tokio::fs::write(&path, &bytes).await.with_context(|| format!("Failed to write {}", path.display()))?;
  Ok(path)
}
