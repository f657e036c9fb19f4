use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use bloggy::{
    app,
    state::{AppConfig, AppState, SharedState},
};
use poststore::NewPost;
use tower::ServiceExt; // for oneshot

pub struct TestClient {
    pub router: Router,
    pub state: SharedState,
}

impl TestClient {
    pub async fn new() -> Self {
        let state = create_test_state().await;
        let router = app(state.clone());
        Self { router, state }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, uri, None, None).await
    }

    pub async fn get_as(&self, uri: &str, auth_header: &str) -> (StatusCode, serde_json::Value) {
        self.request(Method::GET, uri, Some(auth_header), None).await
    }

    pub async fn post(
        &self,
        uri: &str,
        auth_header: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request(Method::POST, uri, auth_header, Some(body))
            .await
    }

    pub async fn put(
        &self,
        uri: &str,
        auth_header: Option<&str>,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.request(Method::PUT, uri, auth_header, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, auth_header: Option<&str>) -> StatusCode {
        self.request(Method::DELETE, uri, auth_header, None).await.0
    }

    pub async fn get_health(&self) -> (StatusCode, String) {
        let request = Request::builder()
            .uri("/health")
            .method("GET")
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8_lossy(&body_bytes).to_string())
    }

    /// Inserts `count` published posts for `author`, oldest first.
    /// Returns ids newest first, the order the feed lists them in.
    pub async fn seed_posts(&self, author: &str, count: usize) -> Vec<String> {
        let mut ids = Vec::new();
        for i in 0..count {
            let post = poststore::create_post(
                &self.state.db,
                author,
                NewPost {
                    title: format!("{} post {}", author, i),
                    excerpt: Some(format!("Excerpt {}", i)),
                    content: format!("Body of post {}", i),
                    tags: Some("rust, feed".to_string()),
                    image: None,
                    published: true,
                },
            )
            .await
            .unwrap();

            // Spread creation times so newest-first order is deterministic
            sqlx::query("UPDATE posts SET created_at = ? WHERE id = ?")
                .bind(1_700_000_000_000_000_i64 + i as i64 * 1_000_000)
                .bind(&post.id)
                .execute(&self.state.db)
                .await
                .unwrap();
            ids.push(post.id);
        }
        ids.reverse();
        ids
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        auth_header: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let mut req_builder = Request::builder().uri(uri).method(method);

        if let Some(token) = auth_header {
            req_builder = req_builder.header("Authorization", token);
        }

        let request = match body {
            Some(body) => req_builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => req_builder.body(Body::empty()).unwrap(),
        };

        // Router is cheap to clone; oneshot consumes it
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body_json: serde_json::Value = if body_bytes.is_empty() {
            serde_json::json!(null)
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or_else(
                |_| serde_json::json!({ "raw": String::from_utf8_lossy(&body_bytes) }),
            )
        };

        (status, body_json)
    }
}

async fn create_test_state() -> SharedState {
    // One connection: every in-memory connection is its own database
    let db = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    poststore::migrate(&db).await.unwrap();

    AppState::new(AppConfig::default(), db)
}
