mod common;
mod posts;

pub use common::{health, root};
pub use posts::{
    create_post, delete_post, get_post, list_posts, update_post, ListQuery, PostDetail,
};
