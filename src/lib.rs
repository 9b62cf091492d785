//! Video feed synchronization for a single YouTube channel: fetch with
//! retry, map API payloads, cache snapshots on disk, and decide when a
//! newly published video is worth an alert.

pub mod cache;
pub mod clock;
pub mod config;
pub mod constants;
pub mod duration;
pub mod error;
pub mod http;
pub mod logging;
pub mod mapper;
pub mod notify;
pub mod seen;
pub mod sync;
pub mod video;
pub mod youtube;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheSnapshot, CacheStore};
pub use error::{ApiError, FeedError, TransportError};
pub use notify::{ConsoleNotifier, NewVideoAlert, Notifier};
pub use seen::{BackgroundOutcome, BackgroundRefresher, SeenIdStore};
pub use sync::{FeedNotice, FeedSynchronizer, FeedView, SyncPhase};
pub use video::{SortOrder, Video};
pub use youtube::YouTubeClient;
