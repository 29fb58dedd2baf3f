//! Presence coordinator and broadcast fan-out.
//!
//! One `Coordinator` serves one channel kind (draft or chat) for every
//! league. It is built once at startup and shared behind an `Arc`.
//!
//! Locking discipline, for every operation below:
//!
//! 1. take the room's lock, read or mutate the slot, copy out what is
//!    needed (a snapshot of connections, the roster, the draft info)
//! 2. release the lock
//! 3. do the I/O: roster lookups, socket writes
//!
//! Socket writes never happen under a room lock, so a slow receiver can
//! not hold up connects and disconnects in the same room.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use leaguehub_protocol::{Codec, DraftState, JsonCodec, LeagueId, ServerEvent, UserId};
use leaguehub_transport::{Connection, ConnectionId};

use crate::{CoordinatorConfig, RoomError, RoomTable, RosterSource, SessionState};

/// A snapshot of room metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub league_id: LeagueId,
    /// Cached roster, empty if nobody is connected.
    pub all_users: Vec<UserId>,
    /// Connected users, sorted.
    pub active_users: Vec<UserId>,
    /// Draft state if a session is attached to the room.
    pub draft_state: Option<DraftState>,
}

/// Tracks who is connected to each league's room and delivers events to
/// them.
pub struct Coordinator<C, R> {
    channel: &'static str,
    rooms: RoomTable<C>,
    roster: R,
    codec: JsonCodec,
    config: CoordinatorConfig,
}

impl<C, R> Coordinator<C, R>
where
    C: Connection,
    R: RosterSource,
{
    /// Creates a coordinator. `channel` labels log lines ("draft", "chat").
    pub fn new(channel: &'static str, roster: R, config: CoordinatorConfig) -> Self {
        Self {
            channel,
            rooms: RoomTable::new(),
            roster,
            codec: JsonCodec,
            config: config.validated(),
        }
    }

    /// The channel label this coordinator was created with.
    pub fn channel(&self) -> &'static str {
        self.channel
    }

    /// The lock table. Exposed for inspection; mutate rooms through the
    /// coordinator's methods.
    pub fn rooms(&self) -> &RoomTable<C> {
        &self.rooms
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// Registers `conn` as `user_id`'s connection to the league's room.
    ///
    /// Loads the roster first if the room has none cached. On success the
    /// caller receives a `state` snapshot (and `draft.info` if a turn is
    /// underway), then everyone, the caller included, receives
    /// `presence.join`.
    ///
    /// A second connect for the same user replaces the earlier handle.
    /// The earlier connection is not closed here.
    ///
    /// # Ordering
    /// The handle becomes visible to [`broadcast`](Self::broadcast) as
    /// soon as it is registered, and the snapshot is written after the
    /// room lock is released. A broadcast racing the connect (a
    /// `draft.turnStart`, another member's `presence.join`) can therefore
    /// reach the new member ahead of its `state` frame. Every draft event
    /// carries the full turn state, so clients should apply events in
    /// arrival order and treat `state` as a presence reset only.
    ///
    /// # Errors
    /// [`RoomError::RosterUnavailable`] if the roster lookup fails. The
    /// connection is not registered in that case.
    pub async fn connect(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        conn: Arc<C>,
    ) -> Result<(), RoomError> {
        let mut fetched: Option<Arc<[UserId]>> = None;

        let (all_users, active_users, draft_info) = loop {
            let lock = self.rooms.acquire_lock(league_id);
            let mut slot = lock.lock().await;

            if slot.roster.is_none() {
                match fetched.take() {
                    Some(roster) => slot.roster = Some(roster),
                    None => {
                        // Never hold the room lock across the lookup.
                        drop(slot);
                        drop(lock);
                        fetched = Some(self.fetch_roster(league_id).await?);
                        continue;
                    }
                }
            }

            let replaced = slot
                .connections
                .insert(user_id.clone(), Arc::clone(&conn))
                .is_some();
            tracing::info!(
                channel = self.channel,
                %league_id,
                %user_id,
                conn_id = %conn.id(),
                replaced,
                members = slot.member_count(),
                "member joined"
            );

            let all_users = slot.roster.as_deref().map(<[UserId]>::to_vec).unwrap_or_default();
            let active_users = sorted_users(slot.connections.keys());
            let draft_info = slot.session.as_ref().and_then(SessionState::info);
            break (all_users, active_users, draft_info);
        };

        let snapshot = ServerEvent::State {
            all_users,
            active_users,
            timestamp: Utc::now(),
        };
        if !self.deliver(league_id, user_id, &conn, &snapshot).await {
            return Ok(());
        }
        if let Some(info) = draft_info {
            if !self.deliver(league_id, user_id, &conn, &info).await {
                return Ok(());
            }
        }

        let join = ServerEvent::PresenceJoin {
            user_id: user_id.clone(),
            timestamp: Utc::now(),
        };
        self.broadcast(league_id, &join).await;
        Ok(())
    }

    /// Removes whatever connection `user_id` holds in the room and tells
    /// the remaining members. Returns `false` (and sends nothing) if the
    /// user was not connected.
    pub async fn disconnect(&self, league_id: &LeagueId, user_id: &UserId) -> bool {
        self.leave(league_id, user_id, None).await
    }

    /// Like [`disconnect`](Self::disconnect), but only if the registered
    /// connection is still `conn_id`. A handle that was replaced by a
    /// newer connect is left alone.
    pub async fn evict(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        conn_id: ConnectionId,
    ) -> bool {
        self.leave(league_id, user_id, Some(conn_id)).await
    }

    async fn leave(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        conn_id: Option<ConnectionId>,
    ) -> bool {
        if !self.remove_member(league_id, user_id, conn_id).await {
            return false;
        }
        let leave = ServerEvent::PresenceLeave {
            user_id: user_id.clone(),
            timestamp: Utc::now(),
        };
        self.broadcast(league_id, &leave).await;
        true
    }

    /// Drops the member from the slot. When that empties the room, the
    /// roster goes in the same critical section, and the lock entry goes
    /// with the last handle to the room.
    async fn remove_member(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        conn_id: Option<ConnectionId>,
    ) -> bool {
        let Some(lock) = self.rooms.get(league_id) else {
            return false;
        };

        let (removed, now_empty) = {
            let mut slot = lock.lock().await;
            let matches = match (slot.connections.get(user_id), conn_id) {
                (Some(conn), Some(expected)) => conn.id() == expected,
                (Some(_), None) => true,
                (None, _) => false,
            };
            if matches {
                slot.connections.remove(user_id);
                if slot.connections.is_empty() {
                    slot.roster = None;
                }
                tracing::info!(
                    channel = self.channel,
                    %league_id,
                    %user_id,
                    members = slot.member_count(),
                    "member left"
                );
            }
            (matches, slot.connections.is_empty())
        };
        drop(lock);

        if removed && now_empty && !self.rooms.contains(league_id) {
            tracing::info!(channel = self.channel, %league_id, "room evicted");
        }
        removed
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Delivers `event` to every member of the room.
    ///
    /// All deliveries run concurrently. A recipient whose send fails or
    /// times out is evicted and the rest of the room is told it left;
    /// nothing is reported to the caller. A room with no members is a
    /// no-op.
    pub async fn broadcast(&self, league_id: &LeagueId, event: &ServerEvent) {
        let mut pending = VecDeque::from([event.clone()]);

        // Evictions produce presence.leave events, which may produce more
        // evictions. Drain them iteratively rather than recursing.
        while let Some(event) = pending.pop_front() {
            for (user_id, conn_id) in self.fan_out(league_id, &event).await {
                if self.remove_member(league_id, &user_id, Some(conn_id)).await {
                    pending.push_back(ServerEvent::PresenceLeave {
                        user_id,
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }

    /// Sends one event to all current members and returns the ones whose
    /// delivery failed.
    async fn fan_out(
        &self,
        league_id: &LeagueId,
        event: &ServerEvent,
    ) -> Vec<(UserId, ConnectionId)> {
        let Some(lock) = self.rooms.get(league_id) else {
            return Vec::new();
        };
        let members: Vec<(UserId, Arc<C>)> = {
            let slot = lock.lock().await;
            slot.connections
                .iter()
                .map(|(user, conn)| (user.clone(), Arc::clone(conn)))
                .collect()
        };
        drop(lock);
        if members.is_empty() {
            return Vec::new();
        }

        let bytes = match self.codec.encode(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(kind = event.kind(), error = %e, "failed to encode event");
                return Vec::new();
            }
        };
        let bytes = bytes.as_slice();
        let send_timeout = self.config.send_timeout;

        tracing::trace!(
            channel = self.channel,
            %league_id,
            kind = event.kind(),
            recipients = members.len(),
            "broadcasting"
        );

        let deliveries = members.iter().map(|(user_id, conn)| async move {
            match tokio::time::timeout(send_timeout, conn.send(bytes)).await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => {
                    tracing::warn!(%league_id, %user_id, error = %e, "delivery failed, evicting");
                    Some((user_id.clone(), conn.id()))
                }
                Err(_) => {
                    tracing::warn!(%league_id, %user_id, "delivery timed out, evicting");
                    Some((user_id.clone(), conn.id()))
                }
            }
        });
        join_all(deliveries).await.into_iter().flatten().collect()
    }

    /// Sends `event` to one member. Returns `false` if the user is not
    /// connected or the delivery failed (in which case they are evicted).
    pub async fn send_to(&self, league_id: &LeagueId, user_id: &UserId, event: &ServerEvent) -> bool {
        let conn = match self.rooms.get(league_id) {
            Some(lock) => lock.lock().await.connections.get(user_id).cloned(),
            None => None,
        };
        match conn {
            Some(conn) => self.deliver(league_id, user_id, &conn, event).await,
            None => false,
        }
    }

    /// Sends to a single connection, evicting it on failure.
    async fn deliver(
        &self,
        league_id: &LeagueId,
        user_id: &UserId,
        conn: &Arc<C>,
        event: &ServerEvent,
    ) -> bool {
        let bytes = match self.codec.encode(event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(kind = event.kind(), error = %e, "failed to encode event");
                return false;
            }
        };
        match tokio::time::timeout(self.config.send_timeout, conn.send(&bytes)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(%league_id, %user_id, error = %e, "delivery failed, evicting");
                self.evict(league_id, user_id, conn.id()).await;
                false
            }
            Err(_) => {
                tracing::warn!(%league_id, %user_id, "delivery timed out, evicting");
                self.evict(league_id, user_id, conn.id()).await;
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Room state
    // -----------------------------------------------------------------------

    /// Returns the league's roster: the cached copy if the room has one,
    /// otherwise a fresh lookup (not cached, since the room has no
    /// members to scope it to).
    pub async fn roster(&self, league_id: &LeagueId) -> Result<Arc<[UserId]>, RoomError> {
        if let Some(lock) = self.rooms.get(league_id) {
            let cached = lock.lock().await.roster.clone();
            if let Some(roster) = cached {
                return Ok(roster);
            }
        }
        self.fetch_roster(league_id).await
    }

    async fn fetch_roster(&self, league_id: &LeagueId) -> Result<Arc<[UserId]>, RoomError> {
        match self.roster.members(league_id).await {
            Ok(members) => {
                tracing::debug!(%league_id, members = members.len(), "roster loaded");
                Ok(members.into())
            }
            Err(source) => {
                tracing::warn!(%league_id, error = %source, "roster lookup failed");
                Err(RoomError::RosterUnavailable {
                    league_id: league_id.clone(),
                    source,
                })
            }
        }
    }

    /// Runs `f` against the room's draft session under the room lock.
    ///
    /// This is the only way to reach a room's session. The room's lock
    /// entry is created if needed and released again afterwards if the
    /// room is left with no members and no session.
    pub async fn with_session<T, F>(&self, league_id: &LeagueId, f: F) -> T
    where
        F: FnOnce(&mut Option<SessionState>) -> T + Send,
    {
        let lock = self.rooms.acquire_lock(league_id);
        let mut slot = lock.lock().await;
        f(&mut slot.session)
    }

    /// Snapshot of the room's roster, members and draft state.
    pub async fn room_info(&self, league_id: &LeagueId) -> RoomInfo {
        let mut info = RoomInfo {
            league_id: league_id.clone(),
            all_users: Vec::new(),
            active_users: Vec::new(),
            draft_state: None,
        };
        if let Some(lock) = self.rooms.get(league_id) {
            let slot = lock.lock().await;
            info.all_users = slot.roster.as_deref().map(<[UserId]>::to_vec).unwrap_or_default();
            info.active_users = sorted_users(slot.connections.keys());
            info.draft_state = slot.session.as_ref().map(SessionState::state);
        }
        info
    }

    /// Connected users in the room, sorted.
    pub async fn active_users(&self, league_id: &LeagueId) -> Vec<UserId> {
        self.room_info(league_id).await.active_users
    }

    /// Whether the room currently has at least one connection.
    pub async fn room_exists(&self, league_id: &LeagueId) -> bool {
        match self.rooms.get(league_id) {
            Some(lock) => lock.lock().await.member_count() > 0,
            None => false,
        }
    }
}

fn sorted_users<'a>(users: impl Iterator<Item = &'a UserId>) -> Vec<UserId> {
    let mut users: Vec<UserId> = users.cloned().collect();
    users.sort();
    users
}
