//! ledgerd - sync server for a multi-device personal-finance ledger

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ledgerd::{
    config::Args,
    db::MongoClient,
    server::{self, AppState},
    store::Stores,
    sync::SyncEngine,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ledgerd={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  ledgerd - personal-finance sync");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );

    let mongo = MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await?;
    let stores = Arc::new(Stores::open(mongo).await?);
    let engine = Arc::new(SyncEngine::new(Arc::clone(&stores)));

    let state = Arc::new(AppState::new(args, stores, engine)?);

    server::run(state).await?;

    Ok(())
}
