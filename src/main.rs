mod config;
mod error;
mod models;
mod routes;
mod services;
mod utils;

use config::Config;
use services::book::BookService;
use services::catalog::BookCatalog;
use services::cover::{CoverGenerator, StabilityClient};
use services::llm::{LLMClient, TextGenerator};
use services::pipeline::BookPipeline;
use services::storage::{FsStorage, Storage};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    // Create the generation clients
    let text: Arc<dyn TextGenerator> = Arc::new(LLMClient::new(&config.text));
    let images = Arc::new(StabilityClient::new(&config.image));
    let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(&config.output_dir));

    let books = BookService::new(
        text.clone(),
        BookPipeline::new(text.clone(), config.pipeline.clone()),
        CoverGenerator::new(text.clone(), images, storage.clone()),
        storage,
        Arc::new(BookCatalog::new()),
        config.author.clone(),
    );

    // Create the application state
    let app = routes::router(routes::AppState {
        books: Arc::new(books),
        public_base_url: config.public_base_url.clone(),
    });

    // Run our application
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
