use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use meowfeed::config::{API_KEY_ENV, AppPaths, Config};
use meowfeed::http::ReqwestTransport;
use meowfeed::video::arrange;
use meowfeed::{
  BackgroundOutcome, BackgroundRefresher, CacheStore, ConsoleNotifier, FeedSynchronizer, SeenIdStore, SortOrder, Video,
  YouTubeClient, logging,
};

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Directory for the cache, seen ids and logs (default: platform data dir)
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Show the channel's latest videos, refreshing unless the cache is fresh
  Videos {
    /// Skip the cache and refresh even if another refresh is running
    #[arg(short, long)]
    force: bool,
    #[arg(short, long, value_enum, default_value = "date")]
    sort: SortArg,
    /// Longest first when sorting by duration
    #[arg(long)]
    descending: bool,
    /// Only show videos whose title or description contains this text
    #[arg(long, default_value = "")]
    filter: String,
  },
  /// Show the cached list if it is still fresh
  Cached,
  /// Run one background check for new uploads
  Background {
    /// Give up after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,
  },
  /// Update saved preferences
  Config {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    channel_id: Option<String>,
    #[arg(long)]
    max_results: Option<u32>,
  },
  /// Print shell completions
  Completions { shell: Shell },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SortArg {
  Date,
  Name,
  Duration,
}

impl SortArg {
  fn order(self, descending: bool) -> SortOrder {
    match self {
      SortArg::Date => SortOrder::Date,
      SortArg::Name => SortOrder::Name,
      SortArg::Duration => SortOrder::Duration { ascending: !descending },
    }
  }
}

// --- Wiring ---

const THUMBNAIL_GRACE: Duration = Duration::from_secs(3);

struct Services {
  client: Arc<YouTubeClient>,
  notifier: Arc<ConsoleNotifier>,
  channel_id: String,
  max_results: u32,
}

fn services(config: &Config) -> Result<Services> {
  let api_key = config
    .api_key()
    .ok_or_else(|| anyhow!("No API key. Set {} or run `meowfeed config --api-key <KEY>`", API_KEY_ENV))?;
  let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;
  let notifier = Arc::new(ConsoleNotifier::new(transport.client().clone()));
  let client = YouTubeClient::new(Arc::new(transport), api_key).context("Invalid API endpoint")?;
  Ok(Services { client: Arc::new(client), notifier, channel_id: config.channel_id(), max_results: config.max_results() })
}

fn print_videos(videos: &[Video]) {
  if videos.is_empty() {
    println!("No videos.");
    return;
  }
  for video in videos {
    println!("{:<20} {:>8}  {}", video.published_label(), video.formatted_duration(), video.title);
    println!("{:<20} {:>8}  {}", "", "", video.watch_url());
  }
}

// --- Commands ---

async fn run_videos(paths: &AppPaths, config: &Config, force: bool, order: SortOrder, filter: &str) -> Result<()> {
  let s = services(config)?;
  let notifier = s.notifier.clone();
  let sync = FeedSynchronizer::new(s.client, CacheStore::new(paths.cache_file()), s.notifier, s.channel_id)
    .with_max_results(s.max_results);

  if !force && let Some(cached) = sync.get_cached_videos_if_fresh().await {
    info!(count = cached.len(), "feed: showing fresh cache");
    print_videos(&arrange(&cached, filter, order));
    return Ok(());
  }

  let view = sync.refresh_for_display(force).await;
  print_videos(&arrange(&view.videos, filter, order));
  if let Some(notice) = view.notice {
    eprintln!("{}", notice.message());
  }
  notifier.settle(THUMBNAIL_GRACE).await;
  Ok(())
}

async fn run_cached(paths: &AppPaths) -> Result<()> {
  match CacheStore::new(paths.cache_file()).load().await {
    Some(snapshot) => {
      println!("Cached at {}", snapshot.saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
      print_videos(&snapshot.videos);
    }
    None => println!("No fresh cache."),
  }
  Ok(())
}

async fn run_background(paths: &AppPaths, config: &Config, deadline_secs: Option<u64>) -> Result<()> {
  let s = services(config)?;
  let notifier = s.notifier.clone();
  let refresher = BackgroundRefresher::new(s.client, SeenIdStore::new(paths.seen_file()), s.notifier, s.channel_id);

  let expiration = CancellationToken::new();
  let on_signal = expiration.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_signal.cancel();
    }
  });
  if let Some(secs) = deadline_secs {
    let on_deadline = expiration.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_secs(secs)).await;
      on_deadline.cancel();
    });
  }

  match refresher.run(&expiration).await.context("Background refresh failed")? {
    BackgroundOutcome::NoVideos => println!("No videos found."),
    BackgroundOutcome::Completed { notified: Some(id), seen } => println!("Announced {} ({} seen).", id, seen),
    BackgroundOutcome::Completed { notified: None, seen } => println!("Nothing new ({} seen).", seen),
  }
  notifier.settle(THUMBNAIL_GRACE).await;
  Ok(())
}

fn run_config(api_key: Option<String>, channel_id: Option<String>, max_results: Option<u32>) -> Result<()> {
  let mut config = Config::load();
  if api_key.is_some() {
    config.api_key = api_key;
  }
  if channel_id.is_some() {
    config.channel_id = channel_id;
  }
  if max_results.is_some() {
    config.max_results = max_results;
  }
  let path = config.save()?;
  println!("Saved {}", path.display());
  Ok(())
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  match args.command {
    Command::Completions { shell } => {
      clap_complete::generate(shell, &mut Args::command(), "meowfeed", &mut std::io::stdout());
      Ok(())
    }
    Command::Config { api_key, channel_id, max_results } => run_config(api_key, channel_id, max_results),
    command => {
      let paths = AppPaths::resolve(args.data_dir)?;
      let _log_guard = logging::init(&paths.log_dir())?;
      let config = Config::load();
      match command {
        Command::Videos { force, sort, descending, filter } => {
          run_videos(&paths, &config, force, sort.order(descending), &filter).await
        }
        Command::Cached => run_cached(&paths).await,
        Command::Background { deadline_secs } => run_background(&paths, &config, deadline_secs).await,
        Command::Config { .. } | Command::Completions { .. } => Ok(()),
      }
    }
  }
}
