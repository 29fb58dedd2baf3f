//! Error types for the room layer.

use leaguehub_protocol::LeagueId;

/// Errors surfaced by room operations.
///
/// Per-recipient delivery failures never show up here: the coordinator
/// recovers from them by evicting the recipient.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The roster lookup failed, so the connection was not registered.
    #[error("roster unavailable for league {league_id}: {source}")]
    RosterUnavailable {
        league_id: LeagueId,
        #[source]
        source: RosterError,
    },
}

/// Errors reported by a [`RosterSource`](crate::RosterSource).
#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    /// No league with this id exists.
    #[error("unknown league {0}")]
    UnknownLeague(LeagueId),

    /// The backing store failed.
    #[error("roster backend failed: {0}")]
    Backend(String),
}
