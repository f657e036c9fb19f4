use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 5;

/// Denormalized author snapshot attached to each post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
}

impl Post {
    pub fn tag_list(&self) -> Vec<String> {
        parse_tags(self.tags.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        Self {
            total,
            page,
            limit,
            total_pages: total_pages(total, limit),
        }
    }

    /// Shape returned alongside an `error` when the store could not answer.
    pub fn fallback(limit: u32) -> Self {
        Self::new(0, 1, limit)
    }
}

/// One page of the feed as served by `GET /posts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PostPage {
    pub fn failed(limit: u32, error: impl Into<String>) -> Self {
        Self {
            posts: Vec::new(),
            pagination: Pagination::fallback(limit),
            error: Some(error.into()),
        }
    }
}

/// `max(1, ceil(total / limit))`
pub fn total_pages(total: u64, limit: u32) -> u32 {
    let limit = u64::from(limit.max(1));
    let pages = total.div_ceil(limit).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// Feed filter dimension: every published post, or only the caller's own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    All,
    Mine,
}

impl Scope {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "mine" | "my" => Some(Self::Mine),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Mine => "mine",
        }
    }
}

/// Splits the stored comma-separated tag string for display.
pub fn parse_tags(tags: Option<&str>) -> Vec<String> {
    tags.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Caller identity carried by the session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Authors may modify their own posts; admins may modify any post.
    pub fn may_modify(&self, author_id: &str) -> bool {
        self.is_admin() || self.user_id == author_id
    }
}

#[derive(Debug, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default)]
    role: Role,
}

/// Reads the identity from a `Bearer <jwt>` header.
///
/// Tokens are minted and verified by the OAuth provider in front of the service;
/// only the payload is decoded here.
pub fn extract_identity(header: Option<&str>) -> anyhow::Result<Identity> {
    use anyhow::Context;
    use base64::{engine::general_purpose, Engine as _};

    let header = header.context("Missing Authorization header")?;

    let parts: Vec<&str> = header.split_whitespace().collect();
    if parts.len() != 2 || !parts[0].eq_ignore_ascii_case("Bearer") {
        anyhow::bail!("Invalid Authorization header format");
    }
    let jwt = parts[1];
    let components: Vec<&str> = jwt.split('.').collect();
    if components.len() != 3 {
        anyhow::bail!("Invalid JWT format");
    }
    let payload_part = components[1];

    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload_part)
        .or_else(|_| general_purpose::URL_SAFE.decode(payload_part))
        .context("Failed to decode JWT payload")?;

    let claims: SessionClaims =
        serde_json::from_slice(&decoded).context("Failed to parse JWT payload")?;
    if claims.sub.is_empty() {
        anyhow::bail!("JWT subject is empty");
    }

    Ok(Identity {
        user_id: claims.sub,
        name: claims.name,
        image: claims.picture,
        role: claims.role,
    })
}
