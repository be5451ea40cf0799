mod cache;
mod config;
mod coordinator;
mod emergency;
mod event;
mod fetch;
mod lifecycle;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cache::SqliteStore;
use config::Config;
use coordinator::Coordinator;
use emergency::{EmergencyClient, EmergencyType, HelpRequestCreate};
use event::SignalHandler;
use fetch::{FetchInterceptor, HttpFetcher, OutboundRequest};
use lifecycle::LifecycleManager;

#[derive(Parser, Debug)]
#[command(name = "aidcache")]
#[command(about = "Offline cache coordinator for the emergency guidance client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/aidcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Pre-seed the static asset cache under the current generation
  Install,
  /// Purge cache generations superseded by the current tags
  Activate,
  /// Proactively fetch and cache emergency data for every category
  Refresh,
  /// Fetch instruction sets for a category, from network or cache
  Instructions {
    #[arg(value_enum)]
    category: EmergencyType,
  },
  /// Run a single request through the interception layer
  Fetch {
    url: String,
    /// Treat the request as a full-page navigation
    #[arg(long)]
    navigation: bool,
  },
  /// Submit a community help request
  Submit {
    #[arg(long, value_enum)]
    emergency_type: EmergencyType,
    /// Free-text location description
    #[arg(long)]
    location: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    info: Option<String>,
    #[arg(long)]
    latitude: Option<f64>,
    #[arg(long)]
    longitude: Option<f64>,
  },
  /// Listen for populate/resync control lines on stdin
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_tracing(args.log_file.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  let store = Arc::new(SqliteStore::open_at(&config.cache_path()?)?);
  let net = HttpFetcher::new()?;

  let interceptor = FetchInterceptor::new(
    Arc::clone(&store),
    net.clone(),
    config.api.prefix.clone(),
    config.root_document_url()?,
    config.generations(),
  );
  let lifecycle = LifecycleManager::new(
    Arc::clone(&store),
    net,
    config.generations(),
    config.static_asset_urls()?,
    config.api_endpoint_urls()?,
  );

  match args.command {
    Command::Install => {
      let report = lifecycle.install().await?;
      println!("cached {} static assets, {} failed", report.cached, report.failed);
    }
    Command::Activate => {
      let report = lifecycle.activate()?;
      if report.purged.is_empty() {
        println!("cache already at the current generation");
      } else {
        for (namespace, generation) in &report.purged {
          println!("purged {}@{}", namespace, generation);
        }
      }
    }
    Command::Refresh => {
      let report = lifecycle.refresh().await?;
      println!("cached {} endpoints, {} failed", report.cached, report.failed);
    }
    Command::Instructions { category } => {
      let client = EmergencyClient::new(interceptor, config.api_root_url()?);
      let (records, source) = client.instructions(category).await?;
      tracing::info!(?source, "serving instructions");
      println!("{}", serde_json::to_string_pretty(&records)?);
    }
    Command::Fetch { url, navigation } => {
      let request = if navigation {
        OutboundRequest::navigation(&url)
      } else {
        OutboundRequest::get(&url)
      };
      let response = interceptor.handle(&request).await?;
      tracing::info!(status = response.status, source = ?response.source, "request handled");
      std::io::stdout().write_all(&response.body)?;
    }
    Command::Submit {
      emergency_type,
      location,
      phone,
      info,
      latitude,
      longitude,
    } => {
      let client = EmergencyClient::new(interceptor, config.api_root_url()?);
      let ack = client
        .submit_help_request(&HelpRequestCreate {
          emergency_type,
          location_description: location,
          latitude,
          longitude,
          contact_phone: phone,
          additional_info: info,
        })
        .await?;
      println!("help request {} accepted ({:?})", ack.id, ack.status);
    }
    Command::Watch => {
      let coordinator = Coordinator::new(lifecycle);
      let mut signals = SignalHandler::from_stdin();
      coordinator.run(&mut signals).await?;
    }
  }

  Ok(())
}

/// Set up tracing with an env-filter, to stderr or a log file.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

  match log_file {
    Some(path) => {
      let directory = path.parent().filter(|p| !p.as_os_str().is_empty());
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;

      let appender = tracing_appender::rolling::never(
        directory.unwrap_or_else(|| Path::new(".")),
        file_name,
      );
      let (writer, guard) = tracing_appender::non_blocking(appender);

      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}
