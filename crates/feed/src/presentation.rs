//! Which pagination affordance to render for a feed view.

use crate::controller::{FeedView, Phase};
use bloggy_core::Scope;

/// Window size up to which every page number is shown.
const FULL_WINDOW: u32 = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaginationStyle {
    /// "Load more" button or infinite-scroll trigger; pages accumulate.
    #[default]
    LoadMore,
    /// Page-number controls; each page replaces the list.
    Numbered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page { number: u32, current: bool },
    Ellipsis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Affordance {
    Hidden,
    LoadMore { loading: bool },
    NoMorePosts,
    Pages {
        items: Vec<PageItem>,
        previous_enabled: bool,
        next_enabled: bool,
    },
}

pub fn affordance(view: &FeedView, style: PaginationStyle) -> Affordance {
    let total_pages = view.pagination.total_pages;
    if total_pages <= 1 {
        return Affordance::Hidden;
    }

    let loading = view.phase.is_loading();
    match style {
        PaginationStyle::LoadMore if view.has_more => Affordance::LoadMore {
            loading: view.phase == Phase::LoadingMore,
        },
        PaginationStyle::LoadMore => Affordance::NoMorePosts,
        PaginationStyle::Numbered => {
            let current = view.pagination.page;
            Affordance::Pages {
                items: page_window(current, total_pages),
                previous_enabled: current > 1 && !loading,
                next_enabled: current < total_pages && !loading,
            }
        }
    }
}

/// First and last page always, the current page with its neighbours, and an
/// ellipsis for each elided run once there are more than seven pages.
pub fn page_window(current: u32, total_pages: u32) -> Vec<PageItem> {
    let page = |number| PageItem::Page {
        number,
        current: number == current,
    };

    let mut items = vec![page(1)];
    if total_pages > FULL_WINDOW {
        if current > 3 {
            items.push(PageItem::Ellipsis);
        }
        let start = current.saturating_sub(1).max(2);
        let end = (current + 1).min(total_pages - 1);
        items.extend((start..=end).map(page));
        if current + 2 < total_pages {
            items.push(PageItem::Ellipsis);
        }
    } else {
        items.extend((2..total_pages).map(page));
    }
    if total_pages > 1 {
        items.push(page(total_pages));
    }
    items
}

/// Message for the "no posts" branch, once loading has settled.
pub fn empty_state(view: &FeedView) -> Option<&'static str> {
    if !view.posts.is_empty() || view.phase.is_loading() {
        return None;
    }
    Some(match view.scope {
        Scope::All => "No posts found. Try a different search query.",
        Scope::Mine => "You haven't created any posts yet.",
    })
}
