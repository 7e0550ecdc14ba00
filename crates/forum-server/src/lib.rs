//! # Forum Mail Server Library
//!
//! Wiring for the mail queue worker process: store selection, transport
//! selection and the background dispatch and maintenance loops.

pub mod app;
pub mod di;

pub use app::{build_transport, MailService};
pub use di::{build_stores, Stores};
