//! # leaguehub
//!
//! Real-time league rooms: presence, broadcast fan-out, and a timed
//! snake-draft scheduler.
//!
//! Every league has a draft room and a chat room. Clients connect over
//! WebSocket to `/draft/ws/{league}/{user}` or `/chat/ws/{league}/{user}`,
//! receive a `state` snapshot, and then see every member's joins and
//! leaves. In the draft room, a `draft.start` message (or
//! [`DraftScheduler::start_draft`](leaguehub_draft::DraftScheduler::start_draft))
//! runs a draft whose turns are broadcast as they start and end.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leaguehub::prelude::*;
//!
//! # async fn run() -> Result<(), LeagueHubError> {
//! let roster = StaticRoster::parse("l1:alice,bob,carol")?;
//! let server = LeagueHubServer::builder()
//!     .bind("0.0.0.0:8000")
//!     .build(roster, MemoryDraftStore::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod route;
mod server;

pub use error::LeagueHubError;
pub use route::{Channel, Route};
pub use server::{LeagueHubServer, LeagueHubServerBuilder, ServerCoordinator, ServerScheduler};

pub mod prelude {
    pub use crate::{Channel, LeagueHubError, LeagueHubServer, LeagueHubServerBuilder, Route};
    pub use leaguehub_draft::{
        DraftConfig, DraftError, DraftScheduler, DraftStore, MemoryDraftStore, StoreError,
    };
    pub use leaguehub_protocol::{
        ClientMessage, Codec, DraftState, JsonCodec, LeagueId, ProtocolError, ServerEvent,
        StartOutcome, TurnEndReason, UserId,
    };
    pub use leaguehub_room::{
        Coordinator, CoordinatorConfig, PickOutcome, RoomError, RoomInfo, RosterError,
        RosterSource, StaticRoster,
    };
    pub use leaguehub_transport::{
        Connection, ConnectionId, MemoryConnection, MemoryPeer, PendingWebSocket, Transport,
        TransportError, WebSocketConnection, WebSocketTransport,
    };
}
