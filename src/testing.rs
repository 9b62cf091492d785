//! In-memory stand-ins for the network and the notification collaborator.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::error::TransportError;
use crate::http::{HttpResponse, RetryPolicy, Transport};
use crate::notify::Notifier;
use crate::video::Video;

/// Accept one connection on a local port, answer its first read with `reply`
/// verbatim, then hold the socket until the peer hangs up.
pub async fn serve_once(reply: &'static [u8]) -> SocketAddr {
  let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move {
    let Ok((mut stream, _)) = listener.accept().await else { return };
    let mut buf = [0u8; 4096];
    if stream.read(&mut buf).await.is_err() {
      return;
    }
    if stream.write_all(reply).await.is_err() {
      return;
    }
    while let Ok(n) = stream.read(&mut buf).await {
      if n == 0 {
        break;
      }
    }
  });
  addr
}

pub fn instant_retry() -> RetryPolicy {
  RetryPolicy { max_retries: 2, base_delay: Duration::ZERO }
}

/// Replays a fixed sequence of results, one per call.
pub struct ScriptedTransport {
  script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
  calls: AtomicUsize,
}

impl ScriptedTransport {
  pub fn new(script: Vec<Result<HttpResponse, TransportError>>) -> Self {
    Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0) }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn get(&self, _url: &Url) -> Result<HttpResponse, TransportError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.script.lock().unwrap().pop_front().unwrap_or_else(|| Err(TransportError::Protocol("script exhausted".into())))
  }
}

/// Fake search + videos endpoints, routed by URL path.
pub struct FakeApi {
  search: Mutex<Result<HttpResponse, TransportError>>,
  details: Mutex<Result<HttpResponse, TransportError>>,
  search_calls: AtomicUsize,
  details_calls: AtomicUsize,
  hang: AtomicBool,
  gate: Mutex<Option<std::sync::Arc<Notify>>>,
}

impl Default for FakeApi {
  fn default() -> Self {
    Self::with_videos(&[])
  }
}

fn ok(body: String) -> Result<HttpResponse, TransportError> {
  Ok(HttpResponse { status: 200, body })
}

impl FakeApi {
  /// Each `(id, publishedAt)` becomes a search hit with a 61 second duration.
  pub fn with_videos(videos: &[(&str, Option<&str>)]) -> Self {
    let api = Self {
      search: Mutex::new(ok(String::new())),
      details: Mutex::new(ok(String::new())),
      search_calls: AtomicUsize::new(0),
      details_calls: AtomicUsize::new(0),
      hang: AtomicBool::new(false),
      gate: Mutex::new(None),
    };
    api.set_videos(videos);
    api
  }

  pub fn set_videos(&self, videos: &[(&str, Option<&str>)]) {
    let search_items: Vec<serde_json::Value> = videos
      .iter()
      .map(|(id, published)| {
        serde_json::json!({
          "id": { "kind": "youtube#video", "videoId": id },
          "snippet": {
            "title": format!("Video {}", id),
            "description": "",
            "publishedAt": published,
            "channelTitle": "Meowbah",
            "thumbnails": { "high": { "url": format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id) } }
          }
        })
      })
      .collect();
    let detail_items: Vec<serde_json::Value> = videos
      .iter()
      .map(|(id, _)| serde_json::json!({ "id": id, "contentDetails": { "duration": "PT1M1S" } }))
      .collect();
    self.set_search(ok(serde_json::json!({ "items": search_items }).to_string()));
    self.set_details(ok(serde_json::json!({ "items": detail_items }).to_string()));
  }

  pub fn set_search(&self, response: Result<HttpResponse, TransportError>) {
    *self.search.lock().unwrap() = response;
  }

  pub fn set_details(&self, response: Result<HttpResponse, TransportError>) {
    *self.details.lock().unwrap() = response;
  }

  /// Make every request wait forever.
  pub fn hang(&self) {
    self.hang.store(true, Ordering::SeqCst);
  }

  /// Hold search requests until the returned handle is notified.
  pub fn gate_search(&self) -> std::sync::Arc<Notify> {
    let notify = std::sync::Arc::new(Notify::new());
    *self.gate.lock().unwrap() = Some(notify.clone());
    notify
  }

  pub fn search_calls(&self) -> usize {
    self.search_calls.load(Ordering::SeqCst)
  }

  pub fn details_calls(&self) -> usize {
    self.details_calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Transport for FakeApi {
  async fn get(&self, url: &Url) -> Result<HttpResponse, TransportError> {
    if self.hang.load(Ordering::SeqCst) {
      std::future::pending::<()>().await;
    }
    if url.path().ends_with("/search") {
      self.search_calls.fetch_add(1, Ordering::SeqCst);
      let gate = self.gate.lock().unwrap().clone();
      if let Some(gate) = gate {
        gate.notified().await;
      }
      self.search.lock().unwrap().clone()
    } else {
      self.details_calls.fetch_add(1, Ordering::SeqCst);
      self.details.lock().unwrap().clone()
    }
  }
}

/// Records every alert request.
#[derive(Default)]
pub struct RecordingNotifier {
  sent: Mutex<Vec<Video>>,
}

impl RecordingNotifier {
  pub fn sent_ids(&self) -> Vec<String> {
    self.sent.lock().unwrap().iter().map(|v| v.id.clone()).collect()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn notify_new_video(&self, video: &Video) {
    self.sent.lock().unwrap().push(video.clone());
  }
}
