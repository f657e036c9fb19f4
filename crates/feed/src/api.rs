use crate::error::{DeleteError, FetchFailure, ValidationError};
use bloggy_core::{PostPage, Scope};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Committed (debounced) filter a page was requested for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedFilter {
    pub scope: Scope,
    pub search: String,
}

/// A validated request for one page of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub(crate) filter: FeedFilter,
    pub(crate) user_id: Option<String>,
    pub(crate) page: u32,
    pub(crate) limit: u32,
}

impl PageRequest {
    pub fn new(
        filter: FeedFilter,
        user_id: Option<&str>,
        page: u32,
        limit: u32,
    ) -> Result<Self, ValidationError> {
        if page < 1 {
            return Err(ValidationError::InvalidPage);
        }
        if limit < 1 {
            return Err(ValidationError::InvalidLimit);
        }
        let user_id = user_id.filter(|id| !id.is_empty()).map(str::to_string);
        if filter.scope == Scope::Mine && user_id.is_none() {
            return Err(ValidationError::MissingUser);
        }

        Ok(Self {
            filter,
            user_id,
            page,
            limit,
        })
    }

    pub fn filter(&self) -> &FeedFilter {
        &self.filter
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Query string for `GET /posts`.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("scope", self.filter.scope.as_str().to_string())];
        if self.filter.scope == Scope::Mine {
            if let Some(user_id) = &self.user_id {
                pairs.push(("userId", user_id.clone()));
            }
        }
        if !self.filter.search.is_empty() {
            pairs.push(("search", self.filter.search.clone()));
        }
        pairs.push(("page", self.page.to_string()));
        pairs.push(("limit", self.limit.to_string()));
        pairs
    }
}

/// Read and delete access to the post store, as seen by the feed.
#[async_trait::async_trait]
pub trait PostSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PostPage, FetchFailure>;

    async fn delete_post(&self, id: &str) -> Result<(), DeleteError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// `PostSource` over the service's HTTP API.
#[derive(Clone, Debug)]
pub struct HttpPostSource {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpPostSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        // Remove trailing slash if present
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            client,
            base_url,
            token: None,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Session token sent as `Authorization: Bearer <token>`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// `<base>/posts/<id>` with the id escaped as a single path segment.
    fn post_url(&self, id: &str) -> Result<Url, FetchFailure> {
        let invalid = || FetchFailure::network(format!("Invalid base URL: {}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .push("posts")
            .push(id);
        Ok(url)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.header("Authorization", format!("Bearer {}", token)),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl PostSource for HttpPostSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PostPage, FetchFailure> {
        let url = format!("{}/posts", self.base_url);
        let req = self
            .client
            .get(&url)
            .query(&request.query_pairs())
            .timeout(self.timeout);

        let res = self
            .authorize(req)
            .send()
            .await
            .map_err(|e| FetchFailure::network(format!("Failed to send feed request: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .ok()
                .and_then(|body| body.error)
                .unwrap_or(text);
            tracing::warn!("Feed request failed: {} - {}", status, message);
            return Err(FetchFailure::server(format!("{} - {}", status, message)));
        }

        let page: PostPage = res
            .json()
            .await
            .map_err(|e| FetchFailure::server(format!("Failed to parse feed response: {}", e)))?;

        // 200 with an `error` field is still a failure
        if let Some(error) = page.error {
            tracing::warn!("Feed request returned an error payload: {}", error);
            return Err(FetchFailure::server(error));
        }

        Ok(page)
    }

    async fn delete_post(&self, id: &str) -> Result<(), DeleteError> {
        let url = self.post_url(id)?;
        let req = self.client.delete(url).timeout(self.timeout);

        let res = self.authorize(req).send().await.map_err(|e| {
            FetchFailure::network(format!("Failed to send delete request: {}", e))
        })?;

        match res.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(DeleteError::Authorization(id.to_string()))
            }
            StatusCode::NOT_FOUND => Err(DeleteError::NotFound(id.to_string())),
            status => {
                let text = res.text().await.unwrap_or_default();
                Err(FetchFailure::server(format!("Delete failed: {} - {}", status, text)).into())
            }
        }
    }
}
