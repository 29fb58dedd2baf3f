//! Draft state persistence.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use leaguehub_protocol::{DraftState, LeagueId};

use crate::StoreError;

/// Records a league's draft lifecycle state somewhere durable.
///
/// Writes are best effort: the running draft does not wait on a retry
/// and does not stop if a write fails.
pub trait DraftStore: Send + Sync + 'static {
    fn save_state(
        &self,
        league_id: &LeagueId,
        state: DraftState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: DraftStore> DraftStore for Arc<T> {
    fn save_state(
        &self,
        league_id: &LeagueId,
        state: DraftState,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).save_state(league_id, state)
    }
}

/// Keeps every write in memory, in order.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    writes: Mutex<Vec<(LeagueId, DraftState)>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every state written for `league_id`, oldest first.
    pub fn history(&self, league_id: &LeagueId) -> Vec<DraftState> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(league, _)| league == league_id)
            .map(|(_, state)| *state)
            .collect()
    }

    /// The most recent state written for `league_id`.
    pub fn latest(&self, league_id: &LeagueId) -> Option<DraftState> {
        self.history(league_id).last().copied()
    }
}

impl DraftStore for MemoryDraftStore {
    async fn save_state(&self, league_id: &LeagueId, state: DraftState) -> Result<(), StoreError> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((league_id.clone(), state));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_history_is_per_league_and_ordered() {
        let store = MemoryDraftStore::new();
        let l1 = LeagueId::from("l1");
        let l2 = LeagueId::from("l2");

        store.save_state(&l1, DraftState::InProgress).await.unwrap();
        store.save_state(&l2, DraftState::InProgress).await.unwrap();
        store.save_state(&l1, DraftState::Completed).await.unwrap();

        assert_eq!(
            store.history(&l1),
            vec![DraftState::InProgress, DraftState::Completed]
        );
        assert_eq!(store.latest(&l2), Some(DraftState::InProgress));
        assert_eq!(store.latest(&LeagueId::from("l3")), None);
    }
}
