pub mod db;

use serde::Deserialize;

pub use db::{
    check_ownership, create_post, delete_post, get_post, list_posts, migrate, related_posts,
    update_post, upsert_user,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub content: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

/// Listing filter. Only published posts are ever listed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// Restricts to one author (`scope = mine`).
    pub author_id: Option<String>,
    /// Case-sensitive substring over title, excerpt, content and tags.
    pub search: Option<String>,
}

impl PostFilter {
    fn search_term(&self) -> Option<&str> {
        self.search.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Caller is the author or an admin.
    Allowed,
    Forbidden,
    Missing,
}
