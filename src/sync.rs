use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::constants::constants;
use crate::error::FeedError;
use crate::notify::Notifier;
use crate::video::{Video, newest};
use crate::youtube::{YouTubeClient, clamp_max_results};

/// Where the synchronizer is in its refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
  Idle,
  Fetching,
  Succeeded,
  Failed,
}

/// Advisory to show next to (or instead of) the list after a failed refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedNotice {
  /// Quota hit, older videos still on screen.
  QuotaAdvisory,
  /// Quota hit and nothing to show yet.
  QuotaUnavailable,
  /// Refresh failed, older videos still on screen.
  RefreshFailed(String),
  /// Refresh failed and nothing to show yet.
  Unavailable(String),
}

impl FeedNotice {
  pub fn from_error(err: &FeedError, has_data: bool) -> Self {
    match (err.is_quota_exceeded(), has_data) {
      (true, true) => FeedNotice::QuotaAdvisory,
      (true, false) => FeedNotice::QuotaUnavailable,
      (false, true) => FeedNotice::RefreshFailed(err.to_string()),
      (false, false) => FeedNotice::Unavailable(err.to_string()),
    }
  }

  pub fn message(&self) -> String {
    match self {
      FeedNotice::QuotaAdvisory => "Showing saved videos. YouTube's request limit was reached, try again later.".to_string(),
      FeedNotice::QuotaUnavailable => "YouTube's request limit was reached. Videos will be back soon.".to_string(),
      FeedNotice::RefreshFailed(e) => format!("Couldn't refresh videos: {}", e),
      FeedNotice::Unavailable(e) => format!("Failed to load videos: {}", e),
    }
  }
}

/// What the caller should render after a refresh attempt.
#[derive(Debug, Clone)]
pub struct FeedView {
  pub videos: Vec<Video>,
  pub notice: Option<FeedNotice>,
}

struct FeedState {
  videos: Vec<Video>,
  known_ids: HashSet<String>,
  last_outcome: SyncPhase,
}

/// Counts a running refresh for as long as it lives, even if its future is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
  fn drop(&mut self) {
    self.0.fetch_sub(1, Ordering::SeqCst);
  }
}

/// Keeps the channel's video list current: fetches, caches, and decides
/// when a newly published video deserves an alert.
///
/// A plain refresh while another is running returns the last known list.
/// A forced refresh always runs; overlapping cycles commit one at a time
/// and the last one to finish wins.
pub struct FeedSynchronizer {
  client: Arc<YouTubeClient>,
  cache: CacheStore,
  notifier: Arc<dyn Notifier>,
  channel_id: String,
  max_results: u32,
  state: StdMutex<FeedState>,
  in_flight: AtomicUsize,
  commit_lock: AsyncMutex<()>,
}

impl FeedSynchronizer {
  pub fn new(
    client: Arc<YouTubeClient>,
    cache: CacheStore,
    notifier: Arc<dyn Notifier>,
    channel_id: impl Into<String>,
  ) -> Self {
    Self {
      client,
      cache,
      notifier,
      channel_id: channel_id.into(),
      max_results: constants().default_max_results,
      state: StdMutex::new(FeedState {
        videos: Vec::new(),
        known_ids: HashSet::new(),
        last_outcome: SyncPhase::Idle,
      }),
      in_flight: AtomicUsize::new(0),
      commit_lock: AsyncMutex::new(()),
    }
  }

  pub fn with_max_results(mut self, max_results: u32) -> Self {
    self.max_results = clamp_max_results(max_results);
    self
  }

  /// Treat `ids` as already seen this session.
  pub fn seed_known_ids<I: IntoIterator<Item = String>>(&self, ids: I) {
    self.lock_state().known_ids.extend(ids);
  }

  fn lock_state(&self) -> MutexGuard<'_, FeedState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn phase(&self) -> SyncPhase {
    if self.in_flight.load(Ordering::SeqCst) > 0 { SyncPhase::Fetching } else { self.lock_state().last_outcome }
  }

  /// The last list handed out, newest first.
  pub fn videos(&self) -> Vec<Video> {
    self.lock_state().videos.clone()
  }

  pub fn known_ids(&self) -> HashSet<String> {
    self.lock_state().known_ids.clone()
  }

  /// Instant startup list from the on-disk snapshot, if still fresh.
  /// Its ids count as seen, so the first refresh only alerts on newer uploads.
  pub async fn get_cached_videos_if_fresh(&self) -> Option<Vec<Video>> {
    let snapshot = self.cache.load().await?;
    let mut state = self.lock_state();
    state.known_ids.extend(snapshot.videos.iter().map(|v| v.id.clone()));
    if state.videos.is_empty() {
      state.videos = snapshot.videos.clone();
    }
    debug!(count = snapshot.videos.len(), "feed: serving cached snapshot");
    Some(snapshot.videos)
  }

  fn begin_fetch(&self, force: bool) -> Option<InFlight<'_>> {
    if force {
      self.in_flight.fetch_add(1, Ordering::SeqCst);
    } else if self.in_flight.compare_exchange(0, 1, Ordering::SeqCst, Ordering::SeqCst).is_err() {
      return None;
    }
    Some(InFlight(&self.in_flight))
  }

  /// Fetch the latest videos. On failure the previous list and cache stay as they were.
  pub async fn get_videos(&self, force: bool) -> Result<Vec<Video>, FeedError> {
    let Some(_flight) = self.begin_fetch(force) else {
      debug!("feed: refresh already in flight, returning last known list");
      return Ok(self.videos());
    };

    info!(force, channel_id = %self.channel_id, "feed: refresh started");
    match self.client.fetch_latest_videos(&self.channel_id, self.max_results).await {
      Ok(videos) => {
        let fresh = self.commit(&videos).await;
        info!(count = videos.len(), new = fresh.is_some(), "feed: refresh succeeded");
        if let Some(video) = fresh {
          self.notifier.notify_new_video(&video).await;
        }
        Ok(videos)
      }
      Err(e) => {
        warn!(err = %e, quota = e.is_quota_exceeded(), "feed: refresh failed");
        self.lock_state().last_outcome = SyncPhase::Failed;
        Err(e)
      }
    }
  }

  /// Persist, swap in the new list, and return the newest unseen video.
  async fn commit(&self, videos: &[Video]) -> Option<Video> {
    let _serialized = self.commit_lock.lock().await;
    self.cache.save(videos).await;

    let mut state = self.lock_state();
    let unseen = videos.iter().filter(|v| !state.known_ids.contains(&v.id));
    let fresh = newest(unseen).cloned();
    state.known_ids.extend(videos.iter().map(|v| v.id.clone()));
    state.videos = videos.to_vec();
    state.last_outcome = SyncPhase::Succeeded;
    fresh
  }

  /// Refresh and fold any error into a notice, keeping older videos visible.
  pub async fn refresh_for_display(&self, force: bool) -> FeedView {
    match self.get_videos(force).await {
      Ok(videos) => FeedView { videos, notice: None },
      Err(e) => {
        let videos = self.videos();
        let notice = FeedNotice::from_error(&e, !videos.is_empty());
        FeedView { videos, notice: Some(notice) }
      }
    }
  }
}
