//! Search and pagination state for one feed.
//!
//! The controller never performs I/O. Every transition that needs the store
//! returns a [`FetchCommand`]; the caller runs it and hands the outcome back
//! through [`FeedController::apply_page`]. Time enters only as the `now`
//! argument of the debounce methods.

use crate::api::{FeedFilter, PageRequest};
use crate::error::{DeleteError, FetchFailure, ValidationError};
use bloggy_core::{Pagination, Post, PostPage, Scope, DEFAULT_PAGE_SIZE};
use std::time::{Duration, Instant};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    pub page_size: u32,
    pub debounce: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Identifies one issued request. Only the most recent ticket is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    generation: u64,
    seq: u64,
}

impl Ticket {
    /// Filter generation the request was captured under.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// The returned page becomes the whole list.
    Replace,
    /// The returned page is appended to the list.
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCommand {
    pub ticket: Ticket,
    pub mode: LoadMode,
    pub request: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    LoadingMore,
    Error(FetchFailure),
}

impl Phase {
    pub fn is_loading(&self) -> bool {
        matches!(self, Phase::Loading | Phase::LoadingMore)
    }
}

/// Read-only snapshot for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedView {
    pub phase: Phase,
    pub posts: Vec<Post>,
    pub pagination: Pagination,
    pub search_query: String,
    pub debounced_search_query: String,
    pub scope: Scope,
    pub has_more: bool,
    pub can_select_mine: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The response belonged to a superseded request and was dropped.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: Ticket,
    mode: LoadMode,
    page: u32,
}

#[derive(Debug)]
pub struct FeedController {
    config: FeedConfig,
    current_user: Option<String>,
    search_query: String,
    debounced_search_query: String,
    scope: Scope,
    debounce_deadline: Option<Instant>,
    page: u32,
    total: u64,
    total_pages: u32,
    posts: Vec<Post>,
    phase: Phase,
    generation: u64,
    next_seq: u64,
    in_flight: Option<InFlight>,
}

impl FeedController {
    pub fn new(config: FeedConfig, current_user: Option<String>) -> Self {
        let config = FeedConfig {
            page_size: config.page_size.max(1),
            ..config
        };

        Self {
            config,
            current_user: current_user.filter(|id| !id.is_empty()),
            search_query: String::new(),
            debounced_search_query: String::new(),
            scope: Scope::All,
            debounce_deadline: None,
            page: 1,
            total: 0,
            total_pages: 1,
            posts: Vec::new(),
            phase: Phase::Idle,
            generation: 0,
            next_seq: 0,
            in_flight: None,
        }
    }

    /// Initial page-1 query for the default filter.
    pub fn start(&mut self) -> FetchCommand {
        self.reset()
    }

    pub fn filter(&self) -> FeedFilter {
        FeedFilter {
            scope: self.scope,
            search: self.debounced_search_query.clone(),
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn has_more(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    pub fn snapshot(&self) -> FeedView {
        FeedView {
            phase: self.phase.clone(),
            posts: self.posts.clone(),
            pagination: Pagination {
                total: self.total,
                page: self.page,
                limit: self.config.page_size,
                total_pages: self.total_pages,
            },
            search_query: self.search_query.clone(),
            debounced_search_query: self.debounced_search_query.clone(),
            scope: self.scope,
            has_more: self.has_more(),
            can_select_mine: self.current_user.is_some(),
        }
    }

    /// Records a keystroke and (re)arms the debounce timer.
    pub fn edit_search(&mut self, text: impl Into<String>, now: Instant) {
        self.search_query = text.into();
        self.debounce_deadline = Some(now + self.config.debounce);
    }

    /// Commits the search text once the quiet period has elapsed.
    pub fn poll_debounce(&mut self, now: Instant) -> Option<FetchCommand> {
        let deadline = self.debounce_deadline?;
        if now < deadline {
            return None;
        }
        self.debounce_deadline = None;

        if self.search_query == self.debounced_search_query {
            return None;
        }
        self.debounced_search_query = self.search_query.clone();
        tracing::debug!("Search committed: {:?}", self.debounced_search_query);
        Some(self.reset())
    }

    pub fn select_scope(&mut self, scope: Scope) -> Result<Option<FetchCommand>, ValidationError> {
        if scope == Scope::Mine && self.current_user.is_none() {
            return Err(ValidationError::MissingUser);
        }
        if scope == self.scope {
            return Ok(None);
        }
        self.scope = scope;
        Ok(Some(self.reset()))
    }

    /// Signing out while viewing `Mine` falls back to `All`.
    pub fn set_current_user(&mut self, user: Option<String>) -> Option<FetchCommand> {
        let user = user.filter(|id| !id.is_empty());
        if user == self.current_user {
            return None;
        }
        self.current_user = user;
        if self.scope == Scope::Mine {
            if self.current_user.is_none() {
                self.scope = Scope::All;
            }
            return Some(self.reset());
        }
        None
    }

    /// Next page for the infinite-scroll / "load more" trigger.
    pub fn load_more(&mut self) -> Option<FetchCommand> {
        if self.phase.is_loading() || !self.has_more() {
            return None;
        }
        self.phase = Phase::LoadingMore;
        Some(self.issue(LoadMode::Append, self.page + 1))
    }

    /// Jump to a page for numbered pagination; the list is replaced on success.
    pub fn go_to_page(&mut self, page: u32) -> Result<Option<FetchCommand>, ValidationError> {
        if page < 1 || page > self.total_pages {
            return Err(ValidationError::PageOutOfRange {
                page,
                total_pages: self.total_pages,
            });
        }
        if self.phase.is_loading() {
            return Ok(None);
        }
        self.phase = Phase::Loading;
        Ok(Some(self.issue(LoadMode::Replace, page)))
    }

    /// Re-issues page 1 for the current filter.
    pub fn refresh(&mut self) -> FetchCommand {
        self.reset()
    }

    pub fn apply_page(
        &mut self,
        ticket: Ticket,
        result: Result<PostPage, FetchFailure>,
    ) -> ApplyOutcome {
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.ticket == ticket => in_flight,
            _ => {
                tracing::debug!(
                    "Discarding stale response (generation={}, current={})",
                    ticket.generation,
                    self.generation
                );
                return ApplyOutcome::Stale;
            }
        };
        self.in_flight = None;

        let result = result.and_then(|page| match page.error {
            Some(error) => Err(FetchFailure::server(error)),
            None => Ok(page),
        });

        match result {
            Ok(page) => {
                let received = page.posts.len();
                match in_flight.mode {
                    LoadMode::Replace => self.posts = page.posts,
                    LoadMode::Append => self.posts.extend(page.posts),
                }
                self.page = in_flight.page;
                self.total = page.pagination.total;
                self.total_pages = page.pagination.total_pages.max(1);
                self.phase = Phase::Idle;
                tracing::debug!(
                    "Applied page {}/{} ({} posts, {} shown)",
                    self.page,
                    self.total_pages,
                    received,
                    self.posts.len()
                );
            }
            Err(failure) => {
                tracing::warn!("Feed query failed: {}", failure);
                self.phase = Phase::Error(failure);
            }
        }
        ApplyOutcome::Applied
    }

    /// Applies the outcome of a delete request.
    ///
    /// On success the post leaves the list, `total` drops by one and the page
    /// count follows it, without re-querying. On failure nothing changes and
    /// the error is returned.
    pub fn apply_delete(&mut self, id: &str, result: Result<(), DeleteError>) -> Result<bool, DeleteError> {
        if let Err(e) = result {
            tracing::warn!("Failed to delete post {}: {}", id, e);
            return Err(e);
        }

        let before = self.posts.len();
        self.posts.retain(|post| post.id != id);
        let removed = self.posts.len() < before;
        if removed {
            self.total = self.total.saturating_sub(1);
            self.total_pages = bloggy_core::total_pages(self.total, self.config.page_size);
            self.page = self.page.min(self.total_pages);
        }
        Ok(removed)
    }

    fn reset(&mut self) -> FetchCommand {
        self.generation += 1;
        self.page = 1;
        self.total = 0;
        self.total_pages = 1;
        self.posts.clear();
        self.phase = Phase::Loading;
        self.issue(LoadMode::Replace, 1)
    }

    fn issue(&mut self, mode: LoadMode, page: u32) -> FetchCommand {
        let ticket = Ticket {
            generation: self.generation,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.in_flight = Some(InFlight { ticket, mode, page });

        // `Mine` is only reachable with a user and page/limit are >= 1 here.
        let request = PageRequest {
            filter: self.filter(),
            user_id: self.current_user.clone(),
            page,
            limit: self.config.page_size,
        };

        FetchCommand {
            ticket,
            mode,
            request,
        }
    }
}
