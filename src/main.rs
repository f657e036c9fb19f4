use bloggy::app;
use bloggy::state::{AppConfig, AppState};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Log initialized");

    let config = AppConfig::from_env();

    tracing::info!("Connecting to database: {}", config.database_url);
    let db = bloggy::connect_database(&config.database_url).await?;
    poststore::migrate(&db).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        "Bloggy listening on {} (default page size {})",
        addr,
        config.page_size
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let router = app(AppState::new(config, db));
    axum::serve(listener, router).await?;

    Ok(())
}
