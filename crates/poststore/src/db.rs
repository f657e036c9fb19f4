use crate::{NewPost, Ownership, PostFilter, PostPatch};
use anyhow::{Context, Result};
use bloggy_core::{Author, Identity, Post};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row, Sqlite, SqlitePool};

const POST_COLUMNS: &str = r#"
    p.id, p.title, p.excerpt, p.content, p.tags, p.image, p.published,
    p.author_id, p.created_at, p.updated_at,
    u.name AS author_name, u.image AS author_image
"#;

const SEARCH_CLAUSE: &str = r#"(
    instr(p.title, ?) > 0
    OR instr(COALESCE(p.excerpt, ''), ?) > 0
    OR instr(p.content, ?) > 0
    OR instr(COALESCE(p.tags, ''), ?) > 0
)"#;

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT,
            image TEXT
        );

        CREATE TABLE IF NOT EXISTS posts (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            excerpt TEXT,
            content TEXT NOT NULL,
            tags TEXT,
            image TEXT,
            published INTEGER NOT NULL DEFAULT 1,
            author_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Keeps the author snapshot in sync with the latest session claims.
pub async fn upsert_user(pool: &SqlitePool, identity: &Identity) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, name, image) VALUES (?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            name = COALESCE(excluded.name, users.name),
            image = COALESCE(excluded.image, users.image)
        "#,
    )
    .bind(&identity.user_id)
    .bind(&identity.name)
    .bind(&identity.image)
    .execute(pool)
    .await
    .context("Failed to upsert user")?;
    Ok(())
}

pub async fn create_post(pool: &SqlitePool, author_id: &str, new: NewPost) -> Result<Post> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().timestamp_micros();

    sqlx::query(
        r#"
        INSERT INTO posts (id, title, excerpt, content, tags, image, published, author_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.title)
    .bind(&new.excerpt)
    .bind(&new.content)
    .bind(&new.tags)
    .bind(&new.image)
    .bind(new.published)
    .bind(author_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to insert post")?;

    tracing::info!("Created post {} by {}", id, author_id);

    get_post(pool, &id)
        .await?
        .context("Inserted post could not be read back")
}

pub async fn get_post(pool: &SqlitePool, id: &str) -> Result<Option<Post>> {
    let sql = format!(
        "SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id WHERE p.id = ?",
        POST_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post")?;

    row.as_ref().map(post_from_row).transpose()
}

/// Newest published posts other than `id`.
pub async fn related_posts(pool: &SqlitePool, id: &str, limit: u32) -> Result<Vec<Post>> {
    let sql = format!(
        r#"
        SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id
        WHERE p.id != ? AND p.published = 1
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT ?
        "#,
        POST_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(id)
        .bind(i64::from(limit))
        .fetch_all(pool)
        .await
        .context("Failed to fetch related posts")?;

    rows.iter().map(post_from_row).collect()
}

pub async fn update_post(pool: &SqlitePool, id: &str, patch: PostPatch) -> Result<Option<Post>> {
    let result = sqlx::query(
        r#"
        UPDATE posts SET
            title = COALESCE(?, title),
            excerpt = COALESCE(?, excerpt),
            content = COALESCE(?, content),
            tags = COALESCE(?, tags),
            image = COALESCE(?, image),
            published = COALESCE(?, published),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&patch.title)
    .bind(&patch.excerpt)
    .bind(&patch.content)
    .bind(&patch.tags)
    .bind(&patch.image)
    .bind(patch.published)
    .bind(Utc::now().timestamp_micros())
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to update post")?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_post(pool, id).await
}

/// Returns `false` when no post had this id.
pub async fn delete_post(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete post")?;
    Ok(result.rows_affected() > 0)
}

/// Whether `identity` may edit or delete post `id`.
pub async fn check_ownership(pool: &SqlitePool, id: &str, identity: &Identity) -> Result<Ownership> {
    let author: Option<String> = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to look up post author")?;

    Ok(match author {
        None => Ownership::Missing,
        Some(author_id) if identity.may_modify(&author_id) => Ownership::Allowed,
        Some(_) => Ownership::Forbidden,
    })
}

/// One page of published posts, newest first, plus the total match count.
pub async fn list_posts(
    pool: &SqlitePool,
    filter: &PostFilter,
    page: u32,
    limit: u32,
) -> Result<(Vec<Post>, u64)> {
    let page = page.max(1);
    let limit = limit.max(1);
    let where_clause = where_clause(filter);

    let count_sql = format!("SELECT COUNT(*) FROM posts p WHERE {}", where_clause);
    let count_row = bind_filter(sqlx::query(&count_sql), filter)
        .fetch_one(pool)
        .await
        .context("Failed to count posts")?;
    let total: i64 = count_row.try_get(0)?;

    let list_sql = format!(
        r#"
        SELECT {} FROM posts p LEFT JOIN users u ON u.id = p.author_id
        WHERE {}
        ORDER BY p.created_at DESC, p.id DESC
        LIMIT ? OFFSET ?
        "#,
        POST_COLUMNS, where_clause
    );
    let offset = i64::from(page - 1) * i64::from(limit);
    let rows = bind_filter(sqlx::query(&list_sql), filter)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to fetch posts")?;

    let posts = rows.iter().map(post_from_row).collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        "Listed {} of {} posts (page={}, limit={}, filter={:?})",
        posts.len(),
        total,
        page,
        limit,
        filter
    );

    Ok((posts, u64::try_from(total).unwrap_or_default()))
}

fn where_clause(filter: &PostFilter) -> String {
    let mut conditions = vec!["p.published = 1"];
    if filter.author_id.is_some() {
        conditions.push("p.author_id = ?");
    }
    if filter.search_term().is_some() {
        conditions.push(SEARCH_CLAUSE);
    }
    conditions.join(" AND ")
}

/// Binds in the same order `where_clause` emits placeholders.
fn bind_filter<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    filter: &'q PostFilter,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    if let Some(author_id) = filter.author_id.as_deref() {
        query = query.bind(author_id);
    }
    if let Some(term) = filter.search_term() {
        for _ in 0..4 {
            query = query.bind(term);
        }
    }
    query
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    let author_id: String = row.try_get("author_id")?;
    let author = Author {
        id: author_id.clone(),
        name: row.try_get("author_name")?,
        image: row.try_get("author_image")?,
    };

    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        excerpt: row.try_get("excerpt")?,
        content: row.try_get("content")?,
        tags: row.try_get("tags")?,
        image: row.try_get("image")?,
        published: row.try_get("published")?,
        created_at: timestamp(row.try_get("created_at")?)?,
        updated_at: timestamp(row.try_get("updated_at")?)?,
        author_id,
        author: Some(author),
    })
}

fn timestamp(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros).context("Stored timestamp out of range")
}
