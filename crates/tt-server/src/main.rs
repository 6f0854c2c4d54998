//! tt server binary.
//!
//! Loads `.env` files, reads `config.toml` (or the path given with
//! `--config`) and `TT_*` environment variables, opens the SQLite store and
//! serves the tt HTTP API until Ctrl-C or SIGTERM.
//!
//! ```
//! TT_ENV=dev tt --url localhost:8000 --logfile tt.log
//! ```

use std::{
  fs::OpenOptions,
  future::IntoFuture as _,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use tt_core::store::ThingStore as _;
use tt_server::{AppState, ServerConfig, broadcast};
use tt_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Keep track of temporary things and when to remove them")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Address to listen on (host:port). Overrides `url` from the config.
  #[arg(long)]
  url: Option<String>,

  /// Write logs to this file instead of stderr.
  #[arg(long, value_name = "FILE")]
  logfile: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  load_dotenv();
  init_tracing(cli.logfile.as_deref());

  // Load configuration.
  let mut builder = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TT").try_parsing(true));
  if let Some(url) = cli.url {
    builder = builder.set_override("url", url)?;
  }
  let settings = builder.build().context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  anyhow::ensure!(
    (1..=broadcast::MAX_CAPACITY).contains(&server_cfg.listener_buffer),
    "listener_buffer must be between 1 and {}, got {}",
    broadcast::MAX_CAPACITY,
    server_cfg.listener_buffer,
  );

  // Open SQLite store.
  let store = SqliteStore::open(&server_cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", server_cfg.store_path))?
    .with_collation(server_cfg.collation);

  let state = AppState::new(store, &server_cfg);
  let broadcaster = state.broadcaster.clone();
  let store = Arc::clone(&state.store);
  let app = tt_server::router(state);

  info!("Listening on http://{}", server_cfg.url);
  let listener = TcpListener::bind(&server_cfg.url)
    .await
    .with_context(|| format!("failed to bind {}", server_cfg.url))?;

  let shutdown = CancellationToken::new();
  tokio::spawn({
    let shutdown = shutdown.clone();
    async move {
      shutdown_signal().await;
      info!("shutting down");
      // Ends open event streams so they don't hold up the drain.
      broadcaster.shutdown();
      shutdown.cancel();
    }
  });

  let server = axum::serve(listener, app)
    .with_graceful_shutdown(shutdown.clone().cancelled_owned())
    .into_future();
  let grace = Duration::from_secs(server_cfg.shutdown_timeout_secs);

  tokio::select! {
    result = server => result.context("server error")?,
    () = async {
      shutdown.cancelled().await;
      tokio::time::sleep(grace).await;
    } => warn!(?grace, "requests still in flight; forcing shutdown"),
  }

  if let Err(e) = store.close().await {
    error!(error = %e, "failed to close store");
  }
  info!("shut down");

  Ok(())
}

/// Load `.env.<TT_ENV>.local` and then `.env`. Variables that are already set
/// win, so the process environment beats both files.
fn load_dotenv() {
  if let Ok(env) = std::env::var("TT_ENV")
    && !env.is_empty()
  {
    dotenvy::from_filename(format!(".env.{env}.local")).ok();
  }
  dotenvy::dotenv().ok();
}

fn init_tracing(logfile: Option<&Path>) {
  let filter = || {
    EnvFilter::builder()
      .with_default_directive(LevelFilter::INFO.into())
      .from_env_lossy()
  };

  let file = logfile.map(|path| {
    OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .map_err(|e| (path, e))
  });

  match file {
    Some(Ok(file)) => {
      tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    }
    Some(Err((path, e))) => {
      tracing_subscriber::fmt().with_env_filter(filter()).init();
      warn!(error = %e, "could not open log file {path:?}; logging to stderr");
    }
    None => tracing_subscriber::fmt().with_env_filter(filter()).init(),
  }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(e) => {
        error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {}
    () = terminate => {}
  }
}
