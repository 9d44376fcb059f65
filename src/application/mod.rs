//! Application services layer.

pub mod comments;
pub mod error;
pub mod likes;
pub mod posts;
pub mod profiles;
pub mod render;
pub mod repos;
pub mod viewer;
