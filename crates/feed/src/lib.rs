//! Client-side feed engine: the query interface to the post store, the
//! search/pagination state machine and the task that drives it.

pub mod api;
pub mod controller;
pub mod error;
pub mod presentation;
pub mod session;

pub use api::{FeedFilter, HttpPostSource, PageRequest, PostSource};
pub use controller::{
    ApplyOutcome, FeedConfig, FeedController, FeedView, FetchCommand, LoadMode, Phase, Ticket,
};
pub use error::{DeleteError, FailureKind, FeedError, FetchFailure, ValidationError};
pub use presentation::{
    affordance, empty_state, page_window, Affordance, PageItem, PaginationStyle,
};
pub use session::{spawn, FeedHandle};
