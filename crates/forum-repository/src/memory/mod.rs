//! In-process implementations for tests and development without MySQL.

mod mail_queue_store;
mod recipient_directory;

pub use mail_queue_store::*;
pub use recipient_directory::*;
