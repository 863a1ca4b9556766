//! Common infrastructure for the parley coordination core.
//!
//! Everything in this crate is shared plumbing for the presence and
//! call-signaling crates: logging setup, supervised background tasks with
//! one-shot teardown, the best-effort write helper, and the change-feed
//! port both cores subscribe to.

pub mod errors;
pub mod feed;
pub mod logging;
pub mod tasks;
pub mod testing;

pub use errors::{Error, Result};
pub use tokio_util::sync::CancellationToken;
pub use feed::{ChangeEvent, ChangeFeed, FeedFilter};
pub use logging::{init_logging, LoggingConfig};
pub use tasks::{best_effort, TaskSet};
