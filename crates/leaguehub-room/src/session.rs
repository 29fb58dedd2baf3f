//! Draft session state kept inside a room slot.
//!
//! The scheduler writes turn fields here and the pick handler reads them,
//! both under the room lock. Each turn gets its own one-shot signal: the
//! sender half lives in the slot, the receiver half ([`PickWaiter`]) goes
//! back to the scheduler. A signal from one turn can never wake the wait
//! for the next, because the next turn allocates a fresh channel and the
//! old sender is dropped.

use chrono::{DateTime, Utc};
use leaguehub_protocol::{DraftState, ServerEvent, UserId};
use tokio::sync::oneshot;

/// Result of a pick attempt against the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    /// The pick ended the current turn.
    Accepted,
    /// The current user already picked this turn. Nothing changed.
    AlreadyPicked,
    /// The sender is not the user whose turn it is.
    NotCurrentUser,
    /// No turn is open (no draft, between turns, or draft finished).
    NoActiveTurn,
}

/// Per-league draft fields visible to the room.
#[derive(Debug)]
pub struct SessionState {
    state: DraftState,
    round: u32,
    current_user: Option<UserId>,
    deadline: Option<DateTime<Utc>>,
    pick_signal: Option<oneshot::Sender<()>>,
    picked: bool,
}

impl SessionState {
    /// A session that has just been started: in progress, no turn yet.
    pub fn started() -> Self {
        Self {
            state: DraftState::InProgress,
            round: 0,
            current_user: None,
            deadline: None,
            pick_signal: None,
            picked: false,
        }
    }

    pub fn state(&self) -> DraftState {
        self.state
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn current_user(&self) -> Option<&UserId> {
        self.current_user.as_ref()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Moves the lifecycle state forward. Backwards moves are ignored.
    pub fn set_state(&mut self, state: DraftState) {
        if self.state.can_transition_to(state) {
            self.state = state;
        } else if self.state != state {
            tracing::debug!(from = %self.state, to = %state, "ignoring invalid draft transition");
        }
    }

    /// Opens a turn and returns the waiter the scheduler races against
    /// the deadline. Any signal left over from the previous turn is
    /// dropped here.
    pub fn begin_turn(
        &mut self,
        round: u32,
        user: UserId,
        deadline: DateTime<Utc>,
    ) -> PickWaiter {
        let (tx, rx) = oneshot::channel();
        self.round = round;
        self.current_user = Some(user);
        self.deadline = Some(deadline);
        self.pick_signal = Some(tx);
        self.picked = false;
        PickWaiter { rx }
    }

    /// Closes the current turn and reports whether its user picked.
    /// Picks arriving after this are stale.
    pub fn end_turn(&mut self) -> bool {
        self.pick_signal = None;
        self.picked
    }

    /// Sets the current turn's signal if `user` holds the turn.
    ///
    /// Sets it at most once: a duplicate pick reports
    /// [`PickOutcome::AlreadyPicked`] and changes nothing.
    pub fn record_pick(&mut self, user: &UserId) -> PickOutcome {
        if self.current_user.as_ref() != Some(user) {
            return if self.pick_signal.is_some() {
                PickOutcome::NotCurrentUser
            } else {
                PickOutcome::NoActiveTurn
            };
        }
        match self.pick_signal.take() {
            Some(tx) => {
                // The waiter may have timed out already; the turn still
                // counts as picked.
                let _ = tx.send(());
                self.picked = true;
                PickOutcome::Accepted
            }
            None if self.picked => PickOutcome::AlreadyPicked,
            None => PickOutcome::NoActiveTurn,
        }
    }

    /// Whether a turn is open and waiting on its user.
    pub fn turn_open(&self) -> bool {
        self.pick_signal.is_some()
    }

    /// The `draft.info` event for a client joining mid-draft, if a turn
    /// is underway.
    pub fn info(&self) -> Option<ServerEvent> {
        if !self.state.is_active() {
            return None;
        }
        let current_user_id = self.current_user.clone()?;
        let deadline = self.deadline?;
        Some(ServerEvent::DraftInfo {
            current_user_id,
            round_num: self.round,
            deadline,
            draft_state: self.state,
        })
    }
}

/// Receiving half of a turn's pick signal.
#[derive(Debug)]
pub struct PickWaiter {
    rx: oneshot::Receiver<()>,
}

impl PickWaiter {
    /// Resolves `true` when the turn's user picks, `false` if the turn
    /// was closed (signal dropped) without a pick.
    pub async fn wait(self) -> bool {
        self.rx.await.is_ok()
    }
}
