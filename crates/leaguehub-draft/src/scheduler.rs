//! Draft scheduler: one turn loop per league.
//!
//! # Turn loop
//!
//! ```text
//! persist IN_PROGRESS ─► session attached ─► draft.stateChange
//!   for (round, user) in snake order:
//!     begin_turn (fresh pick signal) ─► draft.turnStart
//!     race pick signal vs deadline
//!     end_turn ─► draft.turnEnd
//! persist COMPLETED ─► session cleared ─► draft.stateChange
//! ```
//!
//! Each loop runs in its own tokio task. Drafts in different leagues
//! share nothing but the coordinator's lock table.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use leaguehub_protocol::{
    ClientMessage, DraftState, LeagueId, ServerEvent, StartOutcome, TurnEndReason, UserId,
};
use leaguehub_room::{Coordinator, PickOutcome, RosterSource, SessionState};
use leaguehub_transport::Connection;
use rand::seq::SliceRandom;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::{DraftConfig, DraftError, DraftStore, SnakeOrder};

/// Leagues with a running turn loop.
type ActiveSet = Arc<Mutex<HashSet<LeagueId>>>;

/// Starts drafts and routes picks to the running turn loops.
pub struct DraftScheduler<C, R, S> {
    coordinator: Arc<Coordinator<C, R>>,
    store: Arc<S>,
    config: DraftConfig,
    active: ActiveSet,
}

impl<C, R, S> Clone for DraftScheduler<C, R, S> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            active: Arc::clone(&self.active),
        }
    }
}

impl<C, R, S> DraftScheduler<C, R, S>
where
    C: Connection,
    R: RosterSource,
    S: DraftStore,
{
    pub fn new(coordinator: Arc<Coordinator<C, R>>, store: Arc<S>, config: DraftConfig) -> Self {
        Self {
            coordinator,
            store,
            config: config.validated(),
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The coordinator whose rooms this scheduler broadcasts to.
    pub fn coordinator(&self) -> &Arc<Coordinator<C, R>> {
        &self.coordinator
    }

    pub fn config(&self) -> &DraftConfig {
        &self.config
    }

    /// Whether a turn loop is running for the league.
    pub fn is_running(&self, league_id: &LeagueId) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(league_id)
    }

    /// Starts a draft using the league's roster and the scheduler's
    /// configured rounds and timeout.
    ///
    /// Returns [`StartOutcome::AlreadyRunning`] without touching the
    /// roster if a draft is already running.
    ///
    /// # Errors
    /// [`DraftError::Room`] if the roster cannot be loaded.
    pub async fn start_draft(&self, league_id: &LeagueId) -> Result<StartOutcome, DraftError> {
        if self.is_running(league_id) {
            return Ok(StartOutcome::AlreadyRunning);
        }
        let mut participants = self.coordinator.roster(league_id).await?.to_vec();
        if self.config.shuffle_order {
            participants.shuffle(&mut rand::rng());
        }
        Ok(self.start(
            league_id,
            participants,
            self.config.num_rounds,
            self.config.turn_timeout,
        ))
    }

    /// Starts a draft with an explicit participant order.
    ///
    /// Returns immediately; the turn loop runs in a spawned task. A
    /// second start for a league whose draft is still running changes
    /// nothing and reports [`StartOutcome::AlreadyRunning`].
    ///
    /// `turn_timeout` is used as given. Only [`DraftConfig`] values are
    /// bounded, when the scheduler is built.
    pub fn start(
        &self,
        league_id: &LeagueId,
        participants: Vec<UserId>,
        num_rounds: u32,
        turn_timeout: Duration,
    ) -> StartOutcome {
        let Some(claim) = ActiveClaim::acquire(&self.active, league_id) else {
            debug!(%league_id, "draft already running");
            return StartOutcome::AlreadyRunning;
        };
        info!(
            %league_id,
            participants = participants.len(),
            num_rounds,
            turn_timeout_ms = turn_timeout.as_millis() as u64,
            "draft starting"
        );
        let this = self.clone();
        let league_id = league_id.clone();
        tokio::spawn(async move {
            this.run(&league_id, participants, num_rounds, turn_timeout).await;
            drop(claim);
        });
        StartOutcome::Running
    }

    /// Ends the current turn early if `user_id` holds it and `message` is
    /// a pick.
    ///
    /// Returns `None` for messages that are not picks. Stale and
    /// duplicate picks are reported but change nothing.
    pub async fn handle_pick(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        message: &ClientMessage,
    ) -> Option<PickOutcome> {
        if !message.is_pick() {
            return None;
        }
        let outcome = self
            .coordinator
            .with_session(league_id, |session| match session {
                Some(session) => session.record_pick(user_id),
                None => PickOutcome::NoActiveTurn,
            })
            .await;
        match outcome {
            PickOutcome::Accepted => debug!(%league_id, %user_id, "pick accepted"),
            other => debug!(%league_id, %user_id, outcome = ?other, "pick ignored"),
        }
        Some(outcome)
    }

    async fn run(
        &self,
        league_id: &LeagueId,
        participants: Vec<UserId>,
        num_rounds: u32,
        turn_timeout: Duration,
    ) {
        let order = SnakeOrder::new(&participants, num_rounds);
        if order.total_turns() == 0 {
            info!(%league_id, "draft has no turns, completing immediately");
            self.persist(league_id, DraftState::Completed).await;
            self.broadcast_state(league_id, DraftState::Completed).await;
            return;
        }

        self.persist(league_id, DraftState::InProgress).await;
        self.coordinator
            .with_session(league_id, |session| {
                *session = Some(SessionState::started());
            })
            .await;
        self.broadcast_state(league_id, DraftState::InProgress).await;

        for (round, user) in order {
            self.run_turn(league_id, round, user, turn_timeout).await;
        }

        self.persist(league_id, DraftState::Completed).await;
        self.coordinator
            .with_session(league_id, |session| *session = None)
            .await;
        self.broadcast_state(league_id, DraftState::Completed).await;
        info!(%league_id, "draft completed");
    }

    async fn run_turn(
        &self,
        league_id: &LeagueId,
        round: u32,
        user: &UserId,
        turn_timeout: Duration,
    ) {
        let until = Instant::now() + turn_timeout;
        let deadline =
            Utc::now() + TimeDelta::from_std(turn_timeout).unwrap_or_else(|_| TimeDelta::zero());

        let waiter = self
            .coordinator
            .with_session(league_id, |session| {
                session
                    .get_or_insert_with(SessionState::started)
                    .begin_turn(round, user.clone(), deadline)
            })
            .await;
        debug!(%league_id, round, %user, "turn started");
        self.coordinator
            .broadcast(
                league_id,
                &ServerEvent::DraftTurnStart {
                    round_num: round,
                    current_user_id: user.clone(),
                    deadline,
                    draft_state: DraftState::InProgress,
                },
            )
            .await;

        let woke_on_pick = match time::timeout_at(until, waiter.wait()).await {
            Ok(true) => true,
            Ok(false) => {
                // Signal dropped without a pick: the turn still runs its
                // full length.
                time::sleep_until(until).await;
                false
            }
            Err(_) => false,
        };

        // The session decides: a pick accepted after the deadline fired
        // but before the turn closed still ended the turn.
        let picked = self
            .coordinator
            .with_session(league_id, |session| {
                session.as_mut().map_or(woke_on_pick, SessionState::end_turn)
            })
            .await;
        let ended_by = if picked {
            TurnEndReason::Pick
        } else {
            TurnEndReason::Timeout
        };
        debug!(%league_id, round, %user, ?ended_by, "turn ended");
        self.coordinator
            .broadcast(
                league_id,
                &ServerEvent::DraftTurnEnd {
                    round_num: round,
                    previous_user_id: user.clone(),
                    draft_state: DraftState::InProgress,
                    ended_by,
                },
            )
            .await;
    }

    async fn persist(&self, league_id: &LeagueId, state: DraftState) {
        if let Err(e) = self.store.save_state(league_id, state).await {
            warn!(%league_id, %state, error = %e, "failed to persist draft state");
        }
    }

    async fn broadcast_state(&self, league_id: &LeagueId, draft_state: DraftState) {
        self.coordinator
            .broadcast(league_id, &ServerEvent::DraftStateChange { draft_state })
            .await;
    }
}

/// Membership in the active set, released on drop so a panicking turn
/// loop can not wedge its league.
struct ActiveClaim {
    active: ActiveSet,
    league_id: LeagueId,
}

impl ActiveClaim {
    fn acquire(active: &ActiveSet, league_id: &LeagueId) -> Option<Self> {
        let inserted = active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(league_id.clone());
        inserted.then(|| Self {
            active: Arc::clone(active),
            league_id: league_id.clone(),
        })
    }
}

impl Drop for ActiveClaim {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.league_id);
    }
}
