//! Tick hub CLI
//!
//! Streams live ticks for a set of instruments and logs order updates.

use anyhow::{Context, Result};
use clap::Parser;
use services_common::{
    ClientConfig, Environment, SUBSCRIPTION_BATCH_SIZE, TokenProvider, TracingNotifier,
    WatchlistInstrument,
};
use std::path::PathBuf;
use std::sync::Arc;
use tick_hub::TickHub;
use tick_hub::dashboard::{DashboardStats, load_dashboard};
use tick_hub::derived::{TickReducer, Watchlist};
use tick_hub::order_updates::OrderUpdateRelay;
use tick_hub::rest::RestClient;
use tick_hub::storage::{LocalStore, TokenStore};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// FamVest live tick client
#[derive(Parser, Debug)]
#[command(name = "tick-hub")]
#[command(about = "Stream FamVest live ticks and order updates")]
struct Cli {
    /// Comma-separated instrument tokens to watch
    #[arg(long, value_delimiter = ',', required = true)]
    tokens: Vec<u32>,

    /// Backend environment (dev or prod)
    #[arg(long = "env")]
    environment: Option<Environment>,

    /// Backend origin, required for prod
    #[arg(long)]
    origin: Option<String>,

    /// Bearer token to store before connecting
    #[arg(long)]
    token: Option<String>,

    /// Directory for persisted client state
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Load the dashboard once and log its statistics
    #[arg(long)]
    dashboard: bool,
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match (cli.environment, cli.origin.as_deref()) {
        (Some(Environment::Production), Some(origin)) => ClientConfig::production(origin)?,
        (Some(Environment::Production), None) => {
            anyhow::bail!("--origin is required with --env prod")
        }
        (Some(Environment::Development), _) => ClientConfig::development(),
        (None, _) => ClientConfig::from_env()?,
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage_dir.clone_from(dir);
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tick_hub=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(environment = ?config.environment, base_url = %config.base_url, "Starting tick hub");

    let store = Arc::new(LocalStore::open(&config.storage_dir).context("opening client storage")?);
    let token_store = TokenStore::new(Arc::clone(&store));
    if let Some(token) = &cli.token {
        token_store.set(token).context("storing token")?;
    }
    let tokens: Arc<dyn TokenProvider> = Arc::new(token_store);
    let notifier = Arc::new(TracingNotifier);

    if cli.dashboard {
        let api = RestClient::new(&config, Arc::clone(&tokens))?;
        let data = load_dashboard(&api, notifier.as_ref()).await;
        let stats = DashboardStats::compute(&data, chrono::Local::now().naive_local());
        info!(stats = %serde_json::to_string(&stats)?, "Dashboard statistics");
    }

    let hub = TickHub::connect(config, tokens).context("opening live connection")?;

    let relay = Arc::new(OrderUpdateRelay::new(notifier));
    let (refresh_tx, mut refresh_rx) = mpsc::unbounded_channel();
    let relay_task = {
        let relay = Arc::clone(&relay);
        let listener = hub.order_updates();
        tokio::spawn(async move { relay.run(listener, refresh_tx).await })
    };

    let mut watchlist = Watchlist::new(
        "cli",
        cli.tokens
            .iter()
            .map(|&instrument_token| WatchlistInstrument {
                instrument_token,
                ..WatchlistInstrument::default()
            })
            .collect(),
    );
    let mut view = hub
        .view("watchlist", cli.tokens.clone())
        .with_batch_size(SUBSCRIPTION_BATCH_SIZE);
    view.activate().await?;
    info!(tokens = ?cli.tokens, "Watching instruments");

    loop {
        tokio::select! {
            batch = view.next_batch() => {
                let Some(batch) = batch else {
                    warn!("Tick stream ended");
                    break;
                };
                if watchlist.apply_ticks(&batch) == 0 {
                    continue;
                }
                for row in watchlist.instruments() {
                    info!(
                        token = row.instrument_token,
                        ltp = row.last_price,
                        change = row.change,
                        change_abs = row.change_abs,
                        "Quote"
                    );
                }
            }
            Some(target) = refresh_rx.recv() => {
                debug!(path = target.path(), "Refresh requested");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }

    view.close().await;
    relay_task.abort();
    hub.close().await;
    Ok(())
}
