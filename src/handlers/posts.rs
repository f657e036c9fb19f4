use super::common::{authenticate, optional_identity};
use crate::error::AppError;
use crate::state::{SharedState, MAX_PAGE_SIZE, RELATED_POSTS};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use bloggy_core::{Pagination, Post, PostPage, Scope};
use poststore::{NewPost, Ownership, PostFilter, PostPatch};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub scope: Option<String>,
    pub user_id: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    pub post: Post,
    pub related_posts: Vec<Post>,
}

pub async fn list_posts(
    State(state): State<SharedState>,
    Query(params): Query<ListQuery>,
) -> Result<Response, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params
        .limit
        .unwrap_or(state.config.page_size)
        .clamp(1, MAX_PAGE_SIZE);

    let scope = match params.scope.as_deref() {
        None | Some("") => Scope::All,
        Some(raw) => Scope::from_str(raw)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown scope: {}", raw)))?,
    };

    let author_id = match scope {
        Scope::All => None,
        Scope::Mine => {
            let user_id = params
                .user_id
                .filter(|id| !id.is_empty())
                .ok_or_else(|| AppError::BadRequest("scope=mine requires userId".to_string()))?;
            Some(user_id)
        }
    };

    let filter = PostFilter {
        author_id,
        search: params.search.filter(|s| !s.is_empty()),
    };

    tracing::info!(
        "Received posts request (scope={}, search={:?}, page={}, limit={})",
        scope.as_str(),
        filter.search,
        page,
        limit
    );

    match poststore::list_posts(&state.db, &filter, page, limit).await {
        Ok((posts, total)) => Ok(Json(PostPage {
            posts,
            pagination: Pagination::new(total, page, limit),
            error: None,
        })
        .into_response()),
        Err(e) => {
            // Same shape as a successful page so clients can keep rendering
            tracing::error!("Failed to list posts: {:#}", e);
            Ok((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(PostPage::failed(limit, "Failed to fetch posts")),
            )
                .into_response())
        }
    }
}

pub async fn get_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PostDetail>, AppError> {
    let post = poststore::get_post(&state.db, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", id)))?;

    if !post.published {
        let is_author = optional_identity(&headers)
            .map(|identity| identity.may_modify(&post.author_id))
            .unwrap_or(false);
        if !is_author {
            return Err(AppError::NotFound(format!("Post not found: {}", id)));
        }
    }

    let related_posts = poststore::related_posts(&state.db, &id, RELATED_POSTS).await?;

    Ok(Json(PostDetail {
        post,
        related_posts,
    }))
}

pub async fn create_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<NewPost>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let identity = authenticate(&state, &headers).await?;

    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Title and content are required".to_string(),
        ));
    }

    let post = poststore::create_post(&state.db, &identity.user_id, payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "post": post })),
    ))
}

pub async fn update_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(patch): Json<PostPatch>,
) -> Result<Json<serde_json::Value>, AppError> {
    let identity = authenticate(&state, &headers).await?;
    ensure_owner(&state, &id, &identity).await?;

    let blank = |field: &Option<String>| field.as_deref().is_some_and(|s| s.trim().is_empty());
    if blank(&patch.title) || blank(&patch.content) {
        return Err(AppError::BadRequest(
            "Title and content cannot be empty".to_string(),
        ));
    }

    let post = poststore::update_post(&state.db, &id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", id)))?;

    Ok(Json(json!({ "post": post })))
}

pub async fn delete_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let identity = authenticate(&state, &headers).await?;
    ensure_owner(&state, &id, &identity).await?;

    if !poststore::delete_post(&state.db, &id).await? {
        return Err(AppError::NotFound(format!("Post not found: {}", id)));
    }
    tracing::info!("Post {} deleted by {}", id, identity.user_id);

    Ok(StatusCode::NO_CONTENT)
}

async fn ensure_owner(
    state: &SharedState,
    id: &str,
    identity: &bloggy_core::Identity,
) -> Result<(), AppError> {
    match poststore::check_ownership(&state.db, id, identity).await? {
        Ownership::Allowed => Ok(()),
        Ownership::Forbidden => {
            tracing::warn!("{} is not allowed to modify post {}", identity.user_id, id);
            Err(AppError::Forbidden(
                "Only the author can modify this post".to_string(),
            ))
        }
        Ownership::Missing => Err(AppError::NotFound(format!("Post not found: {}", id))),
    }
}
