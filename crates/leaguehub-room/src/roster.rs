//! League membership lookup.
//!
//! The coordinator does not know where memberships are stored. It asks a
//! [`RosterSource`] once per room lifetime and caches the answer in the
//! room slot.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use leaguehub_protocol::{LeagueId, UserId};

use crate::RosterError;

/// Loads the ordered list of users who belong to a league.
pub trait RosterSource: Send + Sync + 'static {
    /// Returns the league's members in their stored order.
    fn members(
        &self,
        league_id: &LeagueId,
    ) -> impl Future<Output = Result<Vec<UserId>, RosterError>> + Send;
}

impl<T: RosterSource> RosterSource for Arc<T> {
    fn members(
        &self,
        league_id: &LeagueId,
    ) -> impl Future<Output = Result<Vec<UserId>, RosterError>> + Send {
        (**self).members(league_id)
    }
}

/// A fixed, in-memory roster.
///
/// Used by the demo server and by tests. Unknown leagues fail with
/// [`RosterError::UnknownLeague`].
#[derive(Debug, Clone, Default)]
pub struct StaticRoster {
    leagues: HashMap<LeagueId, Vec<UserId>>,
}

impl StaticRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a league's member list.
    pub fn with_league<I, U>(mut self, league_id: impl Into<LeagueId>, members: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        self.leagues
            .insert(league_id.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Parses `league:alice,bob;other:carol` into a roster.
    ///
    /// Whitespace around names is trimmed and empty names are skipped.
    pub fn parse(input: &str) -> Result<Self, RosterError> {
        let mut roster = Self::new();
        for entry in input.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (league, members) = entry.split_once(':').ok_or_else(|| {
                RosterError::Backend(format!("roster entry `{entry}` is missing `:`"))
            })?;
            let league = league.trim();
            if league.is_empty() {
                return Err(RosterError::Backend(format!(
                    "roster entry `{entry}` has an empty league id"
                )));
            }
            let members = members
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty());
            roster = roster.with_league(league, members);
        }
        Ok(roster)
    }

    /// Number of leagues known.
    pub fn league_count(&self) -> usize {
        self.leagues.len()
    }
}

impl RosterSource for StaticRoster {
    async fn members(&self, league_id: &LeagueId) -> Result<Vec<UserId>, RosterError> {
        self.leagues
            .get(league_id)
            .cloned()
            .ok_or_else(|| RosterError::UnknownLeague(league_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_roster_returns_members_in_order() {
        let roster = StaticRoster::new().with_league("l1", ["c", "a", "b"]);
        let members = roster.members(&"l1".into()).await.unwrap();
        assert_eq!(members, vec![UserId::from("c"), "a".into(), "b".into()]);
    }

    #[tokio::test]
    async fn test_static_roster_unknown_league() {
        let roster = StaticRoster::new();
        let err = roster.members(&"ghost".into()).await.unwrap_err();
        assert!(matches!(err, RosterError::UnknownLeague(_)));
    }

    #[tokio::test]
    async fn test_parse_roster_string() {
        let roster = StaticRoster::parse(" l1: alice, bob ; l2:carol,,dave; ").unwrap();
        assert_eq!(roster.league_count(), 2);
        assert_eq!(
            roster.members(&"l1".into()).await.unwrap(),
            vec![UserId::from("alice"), "bob".into()]
        );
        assert_eq!(
            roster.members(&"l2".into()).await.unwrap(),
            vec![UserId::from("carol"), "dave".into()]
        );
    }

    #[test]
    fn test_parse_rejects_missing_colon() {
        assert!(StaticRoster::parse("l1=alice").is_err());
        assert!(StaticRoster::parse(":alice").is_err());
    }

    #[tokio::test]
    async fn test_arc_roster_delegates() {
        let roster = Arc::new(StaticRoster::new().with_league("l1", ["a"]));
        let members = RosterSource::members(&roster, &"l1".into()).await.unwrap();
        assert_eq!(members, vec![UserId::from("a")]);
    }
}
