use bloggy_core::DEFAULT_PAGE_SIZE;
use sqlx::SqlitePool;

/// Upper bound for `limit` on `GET /posts`.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Posts listed next to a single post on `GET /posts/:id`.
pub const RELATED_POSTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    /// Default `limit` when the query omits it.
    pub page_size: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/bloggy.db".to_string(),
            port: 3000,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url = std::env::var("DATABASE_URL").unwrap_or(defaults.database_url);
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let page_size = std::env::var("FEED_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .map(|size| size.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(defaults.page_size);

        Self {
            database_url,
            port,
            page_size,
        }
    }
}

pub type SharedState = AppState;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: SqlitePool,
}

impl AppState {
    pub fn new(config: AppConfig, db: SqlitePool) -> Self {
        Self { config, db }
    }
}
