//! Per-connection handler: routing, room membership, and message dispatch.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Parse the upgrade path → channel, league, user
//!   2. Join the channel's room (snapshot + presence.join)
//!   3. Loop: receive frames → dispatch draft control or chat text
//!   4. On exit: evict this connection (presence.leave)

use std::sync::Arc;

use chrono::Utc;
use leaguehub_draft::DraftStore;
use leaguehub_protocol::{ClientMessage, Codec, JsonCodec, LeagueId, ServerEvent, UserId};
use leaguehub_room::RosterSource;
use leaguehub_transport::{Connection, ConnectionId, WebSocketConnection};

use crate::route::{Channel, Route};
use crate::server::{ServerCoordinator, ServerState};
use crate::LeagueHubError;

/// Drop guard that evicts the member's connection when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
/// Eviction is by connection id, so a guard left over from a replaced
/// connection never removes its successor.
struct MemberGuard<R: RosterSource> {
    rooms: Arc<ServerCoordinator<R>>,
    league_id: LeagueId,
    user_id: UserId,
    conn_id: ConnectionId,
}

impl<R: RosterSource> Drop for MemberGuard<R> {
    fn drop(&mut self) {
        let rooms = Arc::clone(&self.rooms);
        let league_id = self.league_id.clone();
        let user_id = self.user_id.clone();
        let conn_id = self.conn_id;
        tokio::spawn(async move {
            rooms.evict(&league_id, &user_id, conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, S>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, S>>,
) -> Result<(), LeagueHubError>
where
    R: RosterSource,
    S: DraftStore,
{
    let conn_id = conn.id();

    // --- Step 1: Route ---
    let route = match Route::parse(conn.path()) {
        Ok(route) => route,
        Err(e) => {
            tracing::debug!(%conn_id, path = conn.path(), "rejecting unrouted connection");
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let Route {
        channel,
        league_id,
        user_id,
    } = route;

    let rooms = match channel {
        Channel::Draft => Arc::clone(state.draft.coordinator()),
        Channel::Chat => Arc::clone(&state.chat),
    };

    // --- Step 2: Join ---
    let conn = Arc::new(conn);
    if let Err(e) = rooms.connect(&league_id, &user_id, Arc::clone(&conn)).await {
        let _ = conn.close().await;
        return Err(e.into());
    }
    let _guard = MemberGuard {
        rooms: Arc::clone(&rooms),
        league_id: league_id.clone(),
        user_id: user_id.clone(),
        conn_id,
    };
    tracing::info!(
        %conn_id,
        channel = channel.as_str(),
        %league_id,
        %user_id,
        "client connected"
    );

    // --- Step 3: Message loop ---
    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%league_id, %user_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%league_id, %user_id, error = %e, "recv error");
                break;
            }
        };

        match channel {
            Channel::Draft => {
                handle_draft_frame(&state, &rooms, &league_id, &user_id, &data).await;
            }
            Channel::Chat => {
                handle_chat_frame(&rooms, &league_id, &user_id, data).await;
            }
        }
    }

    // _guard drops here → eviction fires.
    Ok(())
}

/// Decodes a draft control message and hands it to the scheduler.
async fn handle_draft_frame<R, S>(
    state: &ServerState<R, S>,
    rooms: &ServerCoordinator<R>,
    league_id: &LeagueId,
    user_id: &UserId,
    data: &[u8],
) where
    R: RosterSource,
    S: DraftStore,
{
    let message: ClientMessage = match JsonCodec.decode(data) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(
                %league_id, %user_id, error = %e, "ignoring undecodable draft frame"
            );
            return;
        }
    };

    match message {
        ClientMessage::DraftPicked { .. } => {
            state.draft.handle_pick(league_id, user_id, &message).await;
        }
        ClientMessage::DraftStart => match state.draft.start_draft(league_id).await {
            Ok(status) => {
                rooms
                    .send_to(league_id, user_id, &ServerEvent::DraftStatus { status })
                    .await;
            }
            Err(e) => {
                tracing::warn!(%league_id, %user_id, error = %e, "draft start failed");
            }
        },
    }
}

/// Relays a chat line to the league's chat room.
async fn handle_chat_frame<R: RosterSource>(
    rooms: &ServerCoordinator<R>,
    league_id: &LeagueId,
    user_id: &UserId,
    data: Vec<u8>,
) {
    let text = match String::from_utf8(data) {
        Ok(text) => text,
        Err(_) => {
            tracing::debug!(%league_id, %user_id, "ignoring non-UTF-8 chat frame");
            return;
        }
    };
    let event = ServerEvent::ChatMessage {
        user_id: user_id.clone(),
        text,
        timestamp: Utc::now(),
    };
    rooms.broadcast(league_id, &event).await;
}
