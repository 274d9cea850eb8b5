mod catalog;
mod config;
mod error;
mod routes;


use catalog::ProductCatalog;
use config::ApiConfig;
use routes::{app_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production uses platform-native env injection.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shelf_api=info".parse()?),
        )
        .init();

    let config = ApiConfig::from_env()?;
    tracing::info!("Starting shelf-api with config: {:?}", config);

    let catalog = if config.seed {
        ProductCatalog::seeded()
    } else {
        ProductCatalog::default()
    };
    let router = app_router(AppState::new(catalog));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("shelf-api listening on {}", config.bind_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
