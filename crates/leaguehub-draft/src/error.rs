//! Error types for the draft layer.

use leaguehub_room::RoomError;

/// Errors returned by [`DraftScheduler`](crate::DraftScheduler) operations.
///
/// A duplicate start and a stale pick are not errors: the first returns
/// `StartOutcome::AlreadyRunning`, the second is dropped.
#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    /// Loading the participants from the room's roster failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}

/// Errors reported by a [`DraftStore`](crate::DraftStore).
///
/// The scheduler logs these and carries on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("draft store unavailable: {0}")]
    Unavailable(String),
}
