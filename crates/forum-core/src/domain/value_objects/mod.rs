//! Value objects.

mod email;
mod mail_category;
mod mail_state;

pub use email::*;
pub use mail_category::*;
pub use mail_state::*;
