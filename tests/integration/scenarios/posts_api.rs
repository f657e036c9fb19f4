use crate::helpers::{auth::TestAuth, client::TestClient};
use axum::http::StatusCode;
use serde_json::{json, Value};
use std::collections::HashSet;

fn ids(body: &Value) -> Vec<String> {
    body["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect()
}

/// Default query: scope=all, page 1, five posts, full pagination metadata
#[tokio::test]
async fn test_list_defaults() {
    let client = TestClient::new().await;
    let seeded = client.seed_posts("u1", 12).await;

    let (status, body) = client.get("/posts").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), seeded[..5].to_vec());
    assert_eq!(
        body["pagination"],
        json!({ "total": 12, "page": 1, "limit": 5, "totalPages": 3 })
    );
    assert!(body.get("error").is_none());

    let first = &body["posts"][0];
    assert_eq!(first["authorId"], "u1");
    assert_eq!(first["tags"], "rust, feed");
    assert!(first["createdAt"].is_string());
}

/// Walking every page yields each post exactly once, newest first
#[tokio::test]
async fn test_pages_cover_all_posts() {
    let client = TestClient::new().await;
    let seeded = client.seed_posts("u1", 12).await;

    let mut collected = Vec::new();
    for page in 1..=3 {
        let (status, body) = client.get(&format!("/posts?page={}&limit=5", page)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pagination"]["page"], page);
        collected.extend(ids(&body));
    }

    assert_eq!(collected, seeded);
    let unique: HashSet<_> = collected.iter().collect();
    assert_eq!(unique.len(), 12);

    // Past the end is an empty page, not an error
    let (status, body) = client.get("/posts?page=4").await;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).is_empty());
    assert_eq!(body["pagination"]["total"], 12);
}

#[tokio::test]
async fn test_page_and_limit_are_clamped() {
    let client = TestClient::new().await;
    client.seed_posts("u1", 12).await;

    let (_, body) = client.get("/posts?limit=500").await;
    assert_eq!(body["pagination"]["limit"], 50);
    assert_eq!(body["pagination"]["totalPages"], 1);
    assert_eq!(ids(&body).len(), 12);

    let (_, body) = client.get("/posts?limit=0&page=0").await;
    assert_eq!(body["pagination"]["limit"], 1);
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["totalPages"], 12);
}

#[tokio::test]
async fn test_scope_mine() {
    let client = TestClient::new().await;
    client.seed_posts("u1", 3).await;
    let mine = client.seed_posts("u2", 2).await;

    let (status, body) = client.get("/posts?scope=mine&userId=u2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);
    let listed: HashSet<_> = ids(&body).into_iter().collect();
    let expected: HashSet<_> = mine.into_iter().collect();
    assert_eq!(listed, expected);

    // `mine` without a user is rejected rather than silently widened
    let (status, body) = client.get("/posts?scope=mine").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("userId"));

    let (status, _) = client.get("/posts?scope=everything").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Substring search over title, excerpt, content and tags is case-sensitive
#[tokio::test]
async fn test_search_is_case_sensitive() {
    let client = TestClient::new().await;
    client.seed_posts("u1", 3).await;
    let auth = TestAuth::new("u9");
    let (status, _) = client
        .post(
            "/posts",
            Some(&auth.header_value()),
            json!({ "title": "Learning Rust", "content": "notes" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = client.get("/posts?search=Rust").await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["title"], "Learning Rust");

    // Seeded posts only carry lowercase "rust" in their tags
    let (_, body) = client.get("/posts?search=rust").await;
    assert_eq!(body["pagination"]["total"], 3);

    let (_, body) = client.get("/posts?search=Excerpt%201").await;
    assert_eq!(body["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_search_without_matches() {
    let client = TestClient::new().await;
    client.seed_posts("u1", 4).await;

    let (status, body) = client.get("/posts?search=zzzznomatch").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"], json!([]));
    assert_eq!(
        body["pagination"],
        json!({ "total": 0, "page": 1, "limit": 5, "totalPages": 1 })
    );
}

#[tokio::test]
async fn test_create_post() {
    let client = TestClient::new().await;
    let auth = TestAuth::new("u1");
    let payload = json!({ "title": "Hello", "content": "World", "tags": "a,b" });

    let (status, _) = client.post("/posts", None, payload.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = client
        .post("/posts", Some("Bearer not-a-jwt"), payload.clone())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = client
        .post(
            "/posts",
            Some(&auth.header_value()),
            json!({ "title": "  ", "content": "World" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = client
        .post("/posts", Some(&auth.header_value()), payload)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["post"]["authorId"], "u1");
    assert_eq!(body["post"]["published"], true);
    assert_eq!(body["post"]["author"]["name"], "User u1");

    let id = body["post"]["id"].as_str().unwrap().to_string();
    let (_, list) = client.get("/posts").await;
    assert_eq!(ids(&list), vec![id]);
}

#[tokio::test]
async fn test_get_post_with_related_posts() {
    let client = TestClient::new().await;
    let seeded = client.seed_posts("u1", 5).await;

    let (status, body) = client.get(&format!("/posts/{}", seeded[2])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["id"], seeded[2].as_str());

    let related: Vec<&str> = body["relatedPosts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(related, vec![seeded[0].as_str(), seeded[1].as_str(), seeded[3].as_str()]);

    let (status, body) = client.get("/posts/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

/// Drafts never reach the feed and are only readable by their author
#[tokio::test]
async fn test_unpublished_posts_are_hidden() {
    let client = TestClient::new().await;
    let author = TestAuth::new("u1");

    let (status, body) = client
        .post(
            "/posts",
            Some(&author.header_value()),
            json!({ "title": "Draft", "content": "wip", "published": false }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["post"]["id"].as_str().unwrap().to_string();

    let (_, list) = client.get("/posts").await;
    assert_eq!(list["pagination"]["total"], 0);
    let (_, list) = client.get("/posts?scope=mine&userId=u1").await;
    assert_eq!(list["pagination"]["total"], 0);

    let (status, _) = client.get(&format!("/posts/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = client
        .get_as(&format!("/posts/{}", id), &TestAuth::new("u2").header_value())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = client
        .get_as(&format!("/posts/{}", id), &author.header_value())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "Draft");
}

#[tokio::test]
async fn test_update_post_authorization() {
    let client = TestClient::new().await;
    let id = client.seed_posts("u1", 1).await.remove(0);
    let uri = format!("/posts/{}", id);

    let (status, _) = client.put(&uri, None, json!({ "title": "x" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let stranger = TestAuth::new("u2").header_value();
    let (status, _) = client.put(&uri, Some(&stranger), json!({ "title": "x" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let author = TestAuth::new("u1").header_value();
    let (status, _) = client.put(&uri, Some(&author), json!({ "title": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = client
        .put(&uri, Some(&author), json!({ "title": "Updated" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "Updated");
    assert_eq!(body["post"]["content"], "Body of post 0");

    let admin = TestAuth::admin("moderator").header_value();
    let (status, body) = client
        .put(&uri, Some(&admin), json!({ "tags": "moderated" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["tags"], "moderated");

    let (status, _) = client
        .put("/posts/missing", Some(&author), json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_post_status_codes() {
    let client = TestClient::new().await;
    let seeded = client.seed_posts("u1", 3).await;
    let uri = format!("/posts/{}", seeded[0]);

    assert_eq!(client.delete(&uri, None).await, StatusCode::UNAUTHORIZED);

    let stranger = TestAuth::new("u2").header_value();
    assert_eq!(client.delete(&uri, Some(&stranger)).await, StatusCode::FORBIDDEN);

    let author = TestAuth::new("u1").header_value();
    assert_eq!(client.delete(&uri, Some(&author)).await, StatusCode::NO_CONTENT);
    assert_eq!(client.delete(&uri, Some(&author)).await, StatusCode::NOT_FOUND);

    let admin = TestAuth::admin("moderator").header_value();
    let other = format!("/posts/{}", seeded[1]);
    assert_eq!(client.delete(&other, Some(&admin)).await, StatusCode::NO_CONTENT);

    let (_, body) = client.get("/posts").await;
    assert_eq!(ids(&body), vec![seeded[2].clone()]);
    assert_eq!(body["pagination"]["total"], 1);
}
