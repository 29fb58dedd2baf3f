//! Snake-order draft scheduler for leaguehub.
//!
//! A draft walks a fixed participant list for a number of rounds,
//! reversing direction every round. Each turn ends on the earlier of the
//! current user's pick or the turn deadline. Progress is broadcast to the
//! league's draft room through a [`Coordinator`](leaguehub_room::Coordinator).
//!
//! ```ignore
//! let scheduler = DraftScheduler::new(coordinator, store, DraftConfig::default());
//! match scheduler.start_draft(&league_id).await? {
//!     StartOutcome::Running => { /* turn loop runs in its own task */ }
//!     StartOutcome::AlreadyRunning => {}
//! }
//! ```

mod config;
mod error;
mod order;
mod scheduler;
mod store;

pub use config::DraftConfig;
pub use error::{DraftError, StoreError};
pub use order::SnakeOrder;
pub use scheduler::DraftScheduler;
pub use store::{DraftStore, MemoryDraftStore};
