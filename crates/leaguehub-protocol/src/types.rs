//! Core protocol types for room channels.
//!
//! Every type here travels "on the wire" as JSON. Field names follow the
//! browser client's camelCase convention, and every message carries a
//! `type` tag such as `"presence.join"` or `"draft.turnStart"`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a league, and with it the room its members share.
///
/// A newtype over the database's string id so a league can never be
/// passed where a user is expected. `#[serde(transparent)]` keeps the
/// JSON form a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeagueId(pub String);

impl LeagueId {
    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LeagueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LeagueId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for LeagueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identifies a user across every league they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Draft state
// ---------------------------------------------------------------------------

/// Lifecycle of a league's draft.
///
/// ```text
/// NotStarted → InProgress → Completed
/// ```
///
/// On the wire these are `"NOT_STARTED"`, `"IN_PROGRESS"` and
/// `"COMPLETED"`, the same strings the league table stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftState {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl DraftState {
    /// Returns `true` while turns are being handed out.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns the next state, or `None` from the terminal state.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::InProgress),
            Self::InProgress => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    /// Returns `true` if transitioning to `target` is valid.
    ///
    /// `NotStarted → Completed` is allowed: a draft with nobody to pick
    /// finishes without ever running a turn.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
            || (self == Self::NotStarted && target == Self::Completed)
    }
}

impl fmt::Display for DraftState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
        }
    }
}

/// Why a draft turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnEndReason {
    /// The drafting user sent `draft.picked`.
    Pick,
    /// The turn's deadline passed first.
    Timeout,
}

/// Result of asking a league to start its draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    /// A new draft was started and its turn loop is running.
    #[serde(rename = "running")]
    Running,
    /// A draft was already running for the league. Nothing changed.
    #[serde(rename = "draft_previously_started")]
    AlreadyRunning,
}

// ---------------------------------------------------------------------------
// ServerEvent: everything pushed to a client
// ---------------------------------------------------------------------------

/// An event pushed from the server to a room member.
///
/// Internally tagged: `ServerEvent::PresenceJoin { .. }` encodes as
/// `{"type":"presence.join","userId":"...","timestamp":"..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Snapshot sent to a client right after it connects.
    #[serde(rename = "state")]
    State {
        all_users: Vec<UserId>,
        active_users: Vec<UserId>,
        timestamp: DateTime<Utc>,
    },

    /// A member connected.
    #[serde(rename = "presence.join")]
    PresenceJoin {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },

    /// A member disconnected.
    #[serde(rename = "presence.leave")]
    PresenceLeave {
        user_id: UserId,
        timestamp: DateTime<Utc>,
    },

    /// The league's draft moved to a new lifecycle state.
    #[serde(rename = "draft.stateChange")]
    DraftStateChange { draft_state: DraftState },

    /// A user's turn began.
    #[serde(rename = "draft.turnStart")]
    DraftTurnStart {
        round_num: u32,
        current_user_id: UserId,
        deadline: DateTime<Utc>,
        draft_state: DraftState,
    },

    /// A user's turn ended, by pick or by deadline.
    #[serde(rename = "draft.turnEnd")]
    DraftTurnEnd {
        round_num: u32,
        previous_user_id: UserId,
        draft_state: DraftState,
        ended_by: TurnEndReason,
    },

    /// Current turn, sent once to a client that joins mid-draft.
    #[serde(rename = "draft.info")]
    DraftInfo {
        current_user_id: UserId,
        round_num: u32,
        deadline: DateTime<Utc>,
        draft_state: DraftState,
    },

    /// Reply to a client's `draft.start`.
    #[serde(rename = "draft.status")]
    DraftStatus { status: StartOutcome },

    /// A chat line relayed to the league's chat room.
    #[serde(rename = "chat.message")]
    ChatMessage {
        user_id: UserId,
        text: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerEvent {
    /// The wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::State { .. } => "state",
            Self::PresenceJoin { .. } => "presence.join",
            Self::PresenceLeave { .. } => "presence.leave",
            Self::DraftStateChange { .. } => "draft.stateChange",
            Self::DraftTurnStart { .. } => "draft.turnStart",
            Self::DraftTurnEnd { .. } => "draft.turnEnd",
            Self::DraftInfo { .. } => "draft.info",
            Self::DraftStatus { .. } => "draft.status",
            Self::ChatMessage { .. } => "chat.message",
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage: what a client may send
// ---------------------------------------------------------------------------

/// A message from a client on the draft channel. The sender is implied
/// by the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// The sender made their pick for the current turn. `pick` is opaque
    /// to the room; whoever stores picks consumes it.
    #[serde(rename = "draft.picked")]
    DraftPicked {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pick: Option<serde_json::Value>,
    },

    /// Ask the server to start the league's draft.
    #[serde(rename = "draft.start")]
    DraftStart,
}

impl ClientMessage {
    /// Returns `true` for `draft.picked`.
    pub fn is_pick(&self) -> bool {
        matches!(self, Self::DraftPicked { .. })
    }
}
