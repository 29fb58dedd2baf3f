//! Room registry, presence and broadcast fan-out for leaguehub.
//!
//! Every league gets one room per channel. A room is a lock-guarded slot
//! holding the live connections, the cached roster, and the league's
//! draft session state while a draft runs. All mutation of a slot
//! happens under that room's lock; all network I/O happens after the
//! lock is released.
//!
//! # Key types
//!
//! - [`Coordinator`]: connect/disconnect with presence events, fan-out
//! - [`RoomTable`]: per-room lock allocation and eviction
//! - [`SessionState`]: draft turn fields and the per-turn pick signal
//! - [`RosterSource`]: the collaborator that knows league membership
//! - [`CoordinatorConfig`]: per-recipient delivery timeout

mod config;
mod coordinator;
mod error;
mod roster;
mod session;
mod table;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, RoomInfo};
pub use error::{RoomError, RosterError};
pub use roster::{RosterSource, StaticRoster};
pub use session::{PickOutcome, PickWaiter, SessionState};
pub use table::{RoomHandle, RoomLock, RoomSlot, RoomTable};
