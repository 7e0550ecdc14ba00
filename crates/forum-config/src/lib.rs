//! # Forum Config
//!
//! Layered configuration for the forum mail queue: TOML files, `.env` and
//! `FORUM_*` environment variables.

mod app_config;
mod loader;
mod validation;

pub use app_config::*;
pub use loader::*;
pub use validation::*;
