//! Domain entities.

mod mail_job;
mod recipient;

pub use mail_job::*;
pub use recipient::*;
