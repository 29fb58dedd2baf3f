//! Room lock table: one async lock per league, created on demand.
//!
//! The table itself sits behind a short-lived `std::sync::Mutex` that is
//! only ever held for a map lookup or insert, never across an `.await`.
//! That guard is what keeps two first-connects to a brand-new room from
//! creating two different locks.
//!
//! A room's data lives *inside* its lock ([`RoomSlot`]), so there is no
//! way to touch connections, roster or session without holding it.
//!
//! Locks are handed out as [`RoomHandle`]s. Whichever handle drops last
//! on a vacant room removes its entry, so a reader that happened to hold
//! the lock when the last member left still cleans up behind itself.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use leaguehub_protocol::{LeagueId, UserId};

use crate::SessionState;

/// Everything the coordinator knows about one room.
#[derive(Debug)]
pub struct RoomSlot<C> {
    pub(crate) connections: HashMap<UserId, Arc<C>>,
    pub(crate) roster: Option<Arc<[UserId]>>,
    pub(crate) session: Option<SessionState>,
}

impl<C> RoomSlot<C> {
    fn new() -> Self {
        Self {
            connections: HashMap::new(),
            roster: None,
            session: None,
        }
    }

    /// No members and no draft attached: safe to forget.
    pub fn is_vacant(&self) -> bool {
        self.connections.is_empty() && self.session.is_none()
    }

    /// Number of live connections.
    pub fn member_count(&self) -> usize {
        self.connections.len()
    }
}

/// Shared handle to a room's lock.
pub type RoomLock<C> = Arc<tokio::sync::Mutex<RoomSlot<C>>>;

/// Process-wide map from league to room lock.
pub struct RoomTable<C> {
    rooms: Mutex<HashMap<LeagueId, RoomLock<C>>>,
}

impl<C> RoomTable<C> {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    fn rooms(&self) -> MutexGuard<'_, HashMap<LeagueId, RoomLock<C>>> {
        // The guard is never held across user code, so a poisoned map
        // is still consistent.
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the room's lock, creating it if absent. Never fails.
    pub fn acquire_lock(&self, league_id: &LeagueId) -> RoomHandle<'_, C> {
        let mut rooms = self.rooms();
        let lock = match rooms.get(league_id) {
            Some(lock) => Arc::clone(lock),
            None => {
                let lock = Arc::new(tokio::sync::Mutex::new(RoomSlot::new()));
                rooms.insert(league_id.clone(), Arc::clone(&lock));
                tracing::debug!(%league_id, "room lock created");
                lock
            }
        };
        RoomHandle::new(self, league_id, lock)
    }

    /// Returns the room's lock if one exists, without creating it.
    pub fn get(&self, league_id: &LeagueId) -> Option<RoomHandle<'_, C>> {
        let lock = self.rooms().get(league_id).cloned()?;
        Some(RoomHandle::new(self, league_id, lock))
    }

    /// Drops the room's lock entry if the room is vacant and nobody else
    /// holds a reference to the lock.
    ///
    /// Dropping a [`RoomHandle`] calls this, so explicit calls are only
    /// needed for locks obtained some other way. A task that is waiting
    /// on the lock keeps the entry alive, so it can never end up locking
    /// an orphan while a fresh lock is handed to someone else.
    pub fn release_lock_if_empty(&self, league_id: &LeagueId) -> bool {
        let mut rooms = self.rooms();
        let removable = match rooms.get(league_id) {
            Some(lock) if Arc::strong_count(lock) == 1 => match lock.try_lock() {
                Ok(slot) => slot.is_vacant(),
                Err(_) => false,
            },
            _ => false,
        };
        if removable {
            rooms.remove(league_id);
            tracing::debug!(%league_id, "room lock released");
        }
        removable
    }

    /// Whether a lock entry currently exists for the room.
    pub fn contains(&self, league_id: &LeagueId) -> bool {
        self.rooms().contains_key(league_id)
    }

    /// Number of rooms with a lock entry.
    pub fn len(&self) -> usize {
        self.rooms().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> Default for RoomTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A borrowed reference to one room's lock.
///
/// Derefs to the lock itself. On drop the room's table entry is removed
/// if the room is vacant and this was the last reference.
pub struct RoomHandle<'a, C> {
    table: &'a RoomTable<C>,
    league_id: LeagueId,
    // `None` only while dropping.
    lock: Option<RoomLock<C>>,
}

impl<'a, C> RoomHandle<'a, C> {
    fn new(table: &'a RoomTable<C>, league_id: &LeagueId, lock: RoomLock<C>) -> Self {
        Self {
            table,
            league_id: league_id.clone(),
            lock: Some(lock),
        }
    }

    /// Whether two handles refer to the same room lock.
    pub fn same_lock(&self, other: &Self) -> bool {
        std::ptr::eq(&**self, &**other)
    }
}

impl<C> Deref for RoomHandle<'_, C> {
    type Target = tokio::sync::Mutex<RoomSlot<C>>;

    fn deref(&self) -> &Self::Target {
        match &self.lock {
            Some(lock) => &**lock,
            None => unreachable!("room handle used while dropping"),
        }
    }
}

impl<C> Drop for RoomHandle<'_, C> {
    fn drop(&mut self) {
        // Give up our reference before the check so the last handle to go
        // always sees a count of one.
        drop(self.lock.take());
        self.table.release_lock_if_empty(&self.league_id);
    }
}
