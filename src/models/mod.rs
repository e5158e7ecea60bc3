pub mod post;
pub mod user;

pub use post::{Post, PostInput};
pub use user::{User, UserProfile};
