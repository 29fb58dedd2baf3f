//! Snake turn order.

use leaguehub_protocol::UserId;

/// Yields `(round, user)` for every turn of a draft.
///
/// Rounds are 1-based. Odd rounds walk the participants front to back,
/// even rounds back to front.
#[derive(Debug, Clone)]
pub struct SnakeOrder<'a> {
    participants: &'a [UserId],
    num_rounds: u32,
    round: u32,
    pos: usize,
}

impl<'a> SnakeOrder<'a> {
    pub fn new(participants: &'a [UserId], num_rounds: u32) -> Self {
        Self {
            participants,
            num_rounds,
            round: 1,
            pos: 0,
        }
    }

    /// Total number of turns: participants times rounds.
    pub fn total_turns(&self) -> usize {
        self.participants.len() * self.num_rounds as usize
    }
}

impl<'a> Iterator for SnakeOrder<'a> {
    type Item = (u32, &'a UserId);

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.participants.len();
        if n == 0 || self.round > self.num_rounds {
            return None;
        }
        let index = if self.round % 2 == 1 {
            self.pos
        } else {
            n - 1 - self.pos
        };
        let item = (self.round, &self.participants[index]);

        self.pos += 1;
        if self.pos == n {
            self.pos = 0;
            self.round += 1;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.participants.len();
        let remaining = if n == 0 || self.round > self.num_rounds {
            0
        } else {
            (self.num_rounds - self.round + 1) as usize * n - self.pos
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SnakeOrder<'_> {}
