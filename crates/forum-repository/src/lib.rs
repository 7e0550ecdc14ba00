//! # Forum Repository
//!
//! Persistence for the mail queue.
//!
//! ```text
//! Dispatcher / MailQueue / Maintenance
//!   ↓  Arc<dyn MailQueueStore>
//! MySqlMailQueueStore    (MySQL / SQLx, row locks + compare-and-set)
//! InMemoryMailQueueStore (single mutex, tests and development)
//! ```
//!
//! Every state transition of a job goes through [`MailQueueStore`]; the
//! callers never write rows directly.

pub mod memory;
pub mod mysql;
pub mod pool;
pub mod traits;

pub use memory::*;
pub use mysql::*;
pub use pool::*;
pub use traits::*;
