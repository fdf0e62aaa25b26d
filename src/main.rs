use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rentledger::config::{CliArgs, Config};
use rentledger::http;
use rentledger_core::RecordStore;
use rentledger_memory::InMemoryStore;
use rentledger_postgres::PostgresStore;

#[tokio::main]
async fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    if config.logging.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let store: Arc<dyn RecordStore> = match config.database.url {
        Some(ref url) => {
            let store = PostgresStore::new(url).expect("Failed to connect to PostgreSQL");
            tracing::info!("Using PostgreSQL record store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("No database.url configured, using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    let app = http::router(store);
    let addr = config.listen_addr();

    tracing::info!(%addr, "API listening");

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
