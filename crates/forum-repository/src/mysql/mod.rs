//! MySQL implementations.

mod mail_queue_store;
mod recipient_directory;

pub use mail_queue_store::*;
pub use recipient_directory::*;
