//! Terminal client for a running Bloggy service.
//!
//! Reads commands from stdin and renders the feed every time it settles.
//! Plain text is treated as typing into the search box.

use anyhow::{Context, Result};
use bloggy_core::Scope;
use feed::{
    affordance, empty_state, Affordance, FeedConfig, FeedHandle, FeedView, HttpPostSource,
    PageItem, PaginationStyle, Phase,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
commands:
  <text>          search (empty line clears)
  /all  /mine     switch scope
  /more           load the next page
  /page <n>       jump to page n (numbered pagination)
  /refresh        reload page 1
  /delete <id>    delete one of your posts
  /quit";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let base_url =
        std::env::var("BLOGGY_API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let token = std::env::var("BLOGGY_TOKEN").ok().filter(|t| !t.is_empty());

    let current_user = match &token {
        Some(token) => {
            let identity = bloggy_core::extract_identity(Some(&format!("Bearer {}", token)))
                .context("BLOGGY_TOKEN is not a readable session token")?;
            Some(identity.user_id)
        }
        None => None,
    };

    let mut config = FeedConfig::default();
    if let Some(size) = std::env::var("FEED_PAGE_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        config.page_size = size;
    }

    let client = reqwest::Client::builder()
        .user_agent("feed_browse/0.1")
        .build()?;
    let mut source = HttpPostSource::new(client, &base_url);
    if let Some(token) = token {
        source = source.with_token(token);
    }

    println!("Browsing {} as {}", base_url, current_user.as_deref().unwrap_or("guest"));
    println!("{}", HELP);

    let handle = feed::spawn(Arc::new(source), config, current_user);
    let style = match std::env::var("FEED_PAGINATION").as_deref() {
        Ok("numbered") => PaginationStyle::Numbered,
        _ => PaginationStyle::LoadMore,
    };
    tokio::spawn(render_loop(handle.clone(), style));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !run_command(&handle, line.trim()).await? {
            break;
        }
    }

    Ok(())
}

/// Returns `false` when the user asked to quit.
async fn run_command(handle: &FeedHandle, line: &str) -> Result<bool> {
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    let result = match command {
        "/quit" | "/q" => return Ok(false),
        "/help" => {
            println!("{}", HELP);
            Ok(())
        }
        "/all" => handle.select_scope(Scope::All).await,
        "/mine" => handle.select_scope(Scope::Mine).await,
        "/more" => handle.load_more().await,
        "/refresh" => handle.refresh().await,
        "/page" => match arg.parse() {
            Ok(page) => handle.go_to_page(page).await,
            Err(_) => {
                println!("usage: /page <n>");
                Ok(())
            }
        },
        "/delete" if !arg.is_empty() => match handle.delete_post(arg).await {
            Ok(true) => {
                println!("Deleted {}", arg);
                Ok(())
            }
            Ok(false) => {
                println!("Deleted {} (it was not on screen)", arg);
                Ok(())
            }
            Err(e) => Err(e),
        },
        _ if command.starts_with('/') => {
            println!("unknown command, try /help");
            Ok(())
        }
        _ => handle.search(line).await,
    };

    match result {
        Ok(()) => Ok(true),
        Err(feed::FeedError::Closed) => Ok(false),
        Err(e) => {
            println!("! {}", e);
            Ok(true)
        }
    }
}

async fn render_loop(handle: FeedHandle, style: PaginationStyle) {
    let mut rx = handle.subscribe();
    let mut last_rendered: Option<FeedView> = None;

    while rx.changed().await.is_ok() {
        let view = rx.borrow_and_update().clone();
        if view.phase.is_loading() || last_rendered.as_ref() == Some(&view) {
            continue;
        }
        render(&view, style);
        last_rendered = Some(view);
    }
}

fn render(view: &FeedView, style: PaginationStyle) {
    println!();
    println!(
        "== {} posts | search: {:?} | page {}/{} | total {}",
        view.scope.as_str(),
        view.debounced_search_query,
        view.pagination.page,
        view.pagination.total_pages,
        view.pagination.total
    );

    if let Phase::Error(failure) = &view.phase {
        println!("! could not load posts ({}). /refresh or /more to retry", failure);
    }

    if let Some(message) = empty_state(view) {
        println!("{}", message);
        return;
    }

    for post in &view.posts {
        let author = post
            .author
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| post.author_id.clone());
        println!(
            "- [{}] {} by {} ({})",
            post.id,
            post.title,
            author,
            post.created_at.format("%Y-%m-%d %H:%M")
        );
        if let Some(excerpt) = &post.excerpt {
            println!("    {}", excerpt);
        }
        let tags = post.tag_list();
        if !tags.is_empty() {
            println!("    #{}", tags.join(" #"));
        }
    }

    match affordance(view, style) {
        Affordance::Hidden => {}
        Affordance::LoadMore { loading: true } => println!("... loading"),
        Affordance::LoadMore { loading: false } => println!("-- /more for older posts"),
        Affordance::NoMorePosts => println!("-- no more posts"),
        Affordance::Pages { items, .. } => {
            let pages: Vec<String> = items
                .iter()
                .map(|item| match item {
                    PageItem::Page {
                        number,
                        current: true,
                    } => format!("[{}]", number),
                    PageItem::Page { number, .. } => number.to_string(),
                    PageItem::Ellipsis => "…".to_string(),
                })
                .collect();
            println!("-- pages: {}", pages.join(" "));
        }
    }
}
