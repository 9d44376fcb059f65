//! AutoStocker blog backend: content rendering, posts, comments, likes and profiles.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
