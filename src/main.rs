// plaque - terminal navigator for a local music library
// Pick an album from the queue (or browse), let mpv play it, rate it afterwards.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use plaque::browser::navigator::Entry;
use plaque::config::Config;
use plaque::playback::{ExternalPlayer, Playback, ProcScan, ProcessProbe};
use plaque::ui::App;
use plaque::{Library, Navigator, QueueStore, ResumeTracker};

#[derive(Parser)]
#[command(name = "plaque")]
#[command(about = "Browse a music library, keep a listening queue, hand albums to mpv")]
struct Args {
    /// Config file (default: <config dir>/plaque/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable developer logging (debug level for plaque)
    #[arg(long)]
    dev: bool,

    /// Start in the artist browser instead of the queue
    #[arg(long)]
    browse: bool,

    /// Number of queue entries to sample
    #[arg(short = 'n', long)]
    sample: Option<usize>,
}

fn init_logging(dev: bool) -> Result<WorkerGuard> {
    // Never log to the terminal; the TUI owns it
    let log_dir = dirs::state_dir()
        .map(|dir| dir.join("plaque").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(&log_dir, "plaque.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let default_filter = if dev { "info,plaque=debug" } else { "info" };
    let base_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_env_filter(base_filter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Caller keeps the guard alive so buffered lines are flushed on exit
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.dev)?;

    info!("plaque starting up");

    let mut config = Config::load(args.config.as_deref())?.validate()?;
    if let Some(n) = args.sample {
        config.library.sample = n;
    }

    let library = Library::new(config.library.root.clone());
    let queue = QueueStore::new(config.library.queue.clone());
    let resume = ResumeTracker::new(
        config.library.root.clone(),
        config.player.watch_later_dir.clone(),
    );

    let probe = ProcScan::new(config.player_process_name());
    let start = if args.browse || probe.is_running() {
        info!("starting in artist browser");
        Entry::Artists
    } else {
        Entry::Queue
    };

    let navigator = Navigator::new(
        library.clone(),
        queue.clone(),
        resume.clone(),
        Box::new(probe),
        config.library.sample,
        config.search.bigram_threshold,
    );
    let playback = Playback::new(
        library.clone(),
        queue,
        resume,
        Box::new(ExternalPlayer::from_config(&config.player)),
        config.player.before.clone(),
    );

    let app = App::new(navigator, playback, start)?;
    #[cfg(feature = "discogs")]
    let app = app.with_rater(rater(&config, library));
    #[cfg(not(feature = "discogs"))]
    let _ = library;

    let mut app = app;
    app.run().await?;

    info!("plaque shutting down");
    Ok(())
}

#[cfg(feature = "discogs")]
fn rater(config: &Config, library: Library) -> Option<plaque::metadata::discogs::Rater> {
    if !config.discogs_enabled() {
        info!("no discogs credentials, rating disabled");
        return None;
    }
    match plaque::metadata::discogs::Rater::new(&config.discogs, library) {
        Ok(rater) => Some(rater),
        Err(e) => {
            tracing::warn!("rating disabled: {}", e);
            None
        }
    }
}
