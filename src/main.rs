use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use eyre::Result;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use sharehub_core::blob::local::LocalBlobStore;
use sharehub_core::blob::s3::S3BlobStore;
use sharehub_core::blob::BlobStore;
use sharehub_core::catalog::Catalog;
use sharehub_core::config::{default_config, load_config, AppConfig, BlobConfig};
use sharehub_core::janitor;
use sharehub_core::metrics::AppMetrics;
use sharehub_core::server::{shutdown_signal, start_server, AppState};
use sharehub_core::signaling::hub::SignalingHub;
use sharehub_core::storage::create_storage;

/// Transfer coordination plane: signaling hub and share-code service.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[clap(short, long, value_parser)]
    config: Option<PathBuf>,

    /// Bind address for the server
    #[clap(short, long, value_parser)]
    bind: Option<String>,

    /// Enable verbose logging (can be specified multiple times)
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Builds the blob store, also returning the concrete `LocalBlobStore`
/// handle (when applicable) so `AppState::dev_blob` can serve the URLs
/// it mints.
fn build_blob_store(
    config: &BlobConfig,
    listen_addr: std::net::SocketAddr,
) -> (Arc<dyn BlobStore>, Option<Arc<LocalBlobStore>>) {
    match config {
        BlobConfig::S3 {
            endpoint,
            access_key,
            secret_key,
            bucket,
        } => {
            let store = Arc::new(S3BlobStore::new(
                endpoint.clone(),
                access_key.clone(),
                secret_key.clone(),
                bucket.clone(),
            ));
            (store, None)
        }
        BlobConfig::Local { path } => {
            let store: Arc<LocalBlobStore> = Arc::new(
                LocalBlobStore::new(path.clone(), "dev-only-secret".to_string())
                    .with_base_url(format!("http://{listen_addr}")),
            );
            (store.clone() as Arc<dyn BlobStore>, Some(store))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "sharehub_core=info,tower_http=info".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config: AppConfig = if let Some(config_path) = &cli.config {
        info!("loading configuration from {}", config_path.display());
        match load_config(config_path.to_str().unwrap()) {
            Ok(config) => config,
            Err(err) => {
                warn!("failed to load configuration: {}", err);
                warn!("using default configuration instead");
                default_config()
            }
        }
    } else {
        info!("using default configuration");
        default_config()
    };

    if let Some(bind) = cli.bind {
        config.listen_addr = bind.parse()?;
    }

    let storage = create_storage(&config.catalog)?;
    let catalog = Arc::new(Catalog::new(storage));
    let (blob, dev_blob) = build_blob_store(&config.blob, config.listen_addr);
    let signaling_hub = Arc::new(SignalingHub::new(
        catalog.clone(),
        std::time::Duration::from_secs(config.room_ttl_seconds),
    ));

    let state = Arc::new(AppState {
        catalog,
        blob,
        dev_blob,
        signaling_hub,
        metrics: AppMetrics::new(),
        config,
    });

    info!("starting transfer coordination plane on {}", state.config.listen_addr);

    let janitor_state = state.clone();
    tokio::spawn(janitor::run(janitor_state));

    tokio::select! {
        result = start_server(state) => {
            if let Err(err) = result {
                eprintln!("server error: {err}");
                return Err(err);
            }
        }
        _ = shutdown_signal() => {
            info!("shutdown signal received, shutting down");
        }
    }

    Ok(())
}
