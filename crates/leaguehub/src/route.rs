//! Request path routing.
//!
//! Clients pick their room and identity through the upgrade path:
//! `/draft/ws/{league_id}/{user_id}` or `/chat/ws/{league_id}/{user_id}`.

use leaguehub_protocol::{LeagueId, UserId};

use crate::LeagueHubError;

/// Which room a connection joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Draft,
    Chat,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Chat => "chat",
        }
    }
}

/// A parsed connection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub channel: Channel,
    pub league_id: LeagueId,
    pub user_id: UserId,
}

impl Route {
    /// Parses an upgrade request path. A trailing slash is tolerated.
    pub fn parse(path: &str) -> Result<Self, LeagueHubError> {
        let unknown = || LeagueHubError::UnknownRoute(path.to_string());

        let trimmed = path.strip_prefix('/').ok_or_else(unknown)?;
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let segments: Vec<&str> = trimmed.split('/').collect();

        let [channel, "ws", league, user] = segments.as_slice() else {
            return Err(unknown());
        };
        let channel = match *channel {
            "draft" => Channel::Draft,
            "chat" => Channel::Chat,
            _ => return Err(unknown()),
        };
        if league.is_empty() || user.is_empty() {
            return Err(unknown());
        }

        Ok(Self {
            channel,
            league_id: LeagueId::from(*league),
            user_id: UserId::from(*user),
        })
    }
}
