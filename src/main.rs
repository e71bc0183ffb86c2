//! AgroSense - API gateway for a farm-advisory client

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use agrosense::{
    config::Args,
    db::{MemoryStore, MongoClient, MongoStore},
    logging, server,
    services::HttpPredictionClient,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  AgroSense API gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {} (db {})", args.mongodb_uri, args.mongodb_db);
    info!("Prediction service: {}", args.ml_base_url());
    info!("Upload dir: {}", args.upload_dir.display());
    info!("======================================");

    tokio::fs::create_dir_all(&args.upload_dir).await?;

    let prediction = Arc::new(HttpPredictionClient::new(args.ml_base_url()));

    // MongoDB is optional in dev mode: fall back to the in-memory store
    let state = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            let store = Arc::new(MongoStore::new(&client).await?);
            info!("MongoDB connected, using database '{}'", client.db_name());
            AppState::new(args, store, prediction, "mongodb")?
        }
        Err(e) if args.dev_mode => {
            warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
            AppState::new(args, Arc::new(MemoryStore::new()), prediction, "memory")?
        }
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    server::run(Arc::new(state)).await?;

    Ok(())
}
