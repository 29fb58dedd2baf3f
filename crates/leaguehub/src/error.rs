//! Unified error type for leaguehub.

use leaguehub_draft::{DraftError, StoreError};
use leaguehub_protocol::ProtocolError;
use leaguehub_room::{RoomError, RosterError};
use leaguehub_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LeagueHubError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (roster unavailable).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The roster could not be built or loaded.
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// A draft-level error.
    #[error(transparent)]
    Draft(#[from] DraftError),

    /// The draft state store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The request path is not a known channel route.
    #[error("no route for path `{0}`")]
    UnknownRoute(String),
}
