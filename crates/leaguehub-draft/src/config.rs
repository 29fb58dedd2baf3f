use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Settings used by [`DraftScheduler::start_draft`](crate::DraftScheduler::start_draft).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftConfig {
    /// Rounds per draft. Every participant gets one turn per round.
    pub num_rounds: u32,
    /// How long a user has to pick before the turn ends on its own.
    pub turn_timeout: Duration,
    /// Shuffle the roster into a random draft order instead of using it
    /// as stored.
    pub shuffle_order: bool,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            num_rounds: 3,
            turn_timeout: Duration::from_secs(60),
            shuffle_order: false,
        }
    }
}

impl DraftConfig {
    pub const MIN_TURN_TIMEOUT: Duration = Duration::from_secs(1);
    pub const MAX_TURN_TIMEOUT: Duration = Duration::from_secs(60 * 60);

    /// Clamp out-of-range values so the config is safe to use.
    pub fn validated(mut self) -> Self {
        self.turn_timeout = Self::clamp_turn_timeout(self.turn_timeout);
        self
    }

    /// Bounds a turn timeout to `MIN_TURN_TIMEOUT..=MAX_TURN_TIMEOUT`.
    pub fn clamp_turn_timeout(turn_timeout: Duration) -> Duration {
        if turn_timeout < Self::MIN_TURN_TIMEOUT || turn_timeout > Self::MAX_TURN_TIMEOUT {
            let clamped = turn_timeout.clamp(Self::MIN_TURN_TIMEOUT, Self::MAX_TURN_TIMEOUT);
            warn!(
                requested_ms = turn_timeout.as_millis() as u64,
                clamped_ms = clamped.as_millis() as u64,
                "turn_timeout out of range, clamping"
            );
            return clamped;
        }
        turn_timeout
    }
}
