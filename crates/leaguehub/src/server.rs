//! `LeagueHubServer` builder and server loop.
//!
//! This is the entry point for running a leaguehub server. It ties
//! together all the layers: transport → routing → room → draft.

use std::sync::Arc;
use std::time::Duration;

use leaguehub_draft::{DraftConfig, DraftScheduler, DraftStore};
use leaguehub_room::{Coordinator, CoordinatorConfig, RosterSource};
use leaguehub_transport::{WebSocketConnection, WebSocketTransport};

use crate::LeagueHubError;
use crate::handler::handle_connection;

/// Draft scheduler as wired by the server.
pub type ServerScheduler<R, S> = DraftScheduler<WebSocketConnection, Arc<R>, S>;

/// Room coordinator as wired by the server.
pub type ServerCoordinator<R> = Coordinator<WebSocketConnection, Arc<R>>;

/// Shared server state passed to each connection handler task.
///
/// The draft scheduler owns the draft room coordinator; chat rooms have
/// their own coordinator so the two channels never share presence.
pub(crate) struct ServerState<R, S> {
    pub(crate) draft: ServerScheduler<R, S>,
    pub(crate) chat: Arc<ServerCoordinator<R>>,
}

/// Builder for configuring and starting a leaguehub server.
///
/// # Example
///
/// ```rust,no_run
/// use leaguehub::prelude::*;
///
/// # async fn run() -> Result<(), LeagueHubError> {
/// let server = LeagueHubServer::builder()
///     .bind("0.0.0.0:8000")
///     .draft_config(DraftConfig { num_rounds: 5, ..DraftConfig::default() })
///     .build(StaticRoster::parse("l1:alice,bob")?, MemoryDraftStore::new())
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct LeagueHubServerBuilder {
    bind_addr: String,
    coordinator_config: CoordinatorConfig,
    draft_config: DraftConfig,
    handshake_timeout: Duration,
}

impl LeagueHubServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            coordinator_config: CoordinatorConfig::default(),
            draft_config: DraftConfig::default(),
            handshake_timeout: WebSocketTransport::DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room coordinator configuration (applies to both channels).
    pub fn coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator_config = config;
        self
    }

    /// Sets the draft configuration used by `draft.start`.
    pub fn draft_config(mut self, config: DraftConfig) -> Self {
        self.draft_config = config;
        self
    }

    /// Sets how long a client has to complete the WebSocket upgrade.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Binds the listener and wires the coordinators and scheduler.
    pub async fn build<R, S>(
        self,
        roster: R,
        store: S,
    ) -> Result<LeagueHubServer<R, S>, LeagueHubError>
    where
        R: RosterSource,
        S: DraftStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr)
            .await?
            .with_handshake_timeout(self.handshake_timeout);

        let roster = Arc::new(roster);
        let draft_rooms = Coordinator::new(
            "draft",
            Arc::clone(&roster),
            self.coordinator_config.clone(),
        );
        let chat_rooms = Coordinator::new("chat", roster, self.coordinator_config);
        let draft = DraftScheduler::new(
            Arc::new(draft_rooms),
            Arc::new(store),
            self.draft_config,
        );

        let state = Arc::new(ServerState {
            draft,
            chat: Arc::new(chat_rooms),
        });

        Ok(LeagueHubServer { transport, state })
    }
}

impl Default for LeagueHubServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound leaguehub server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LeagueHubServer<R, S> {
    transport: WebSocketTransport,
    state: Arc<ServerState<R, S>>,
}

impl LeagueHubServer<(), ()> {
    /// Creates a new builder. The roster and store types are fixed by
    /// [`LeagueHubServerBuilder::build`].
    pub fn builder() -> LeagueHubServerBuilder {
        LeagueHubServerBuilder::new()
    }
}

impl<R, S> LeagueHubServer<R, S>
where
    R: RosterSource,
    S: DraftStore,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the draft scheduler, for starting drafts from outside
    /// the socket protocol. Stays usable after [`run`](Self::run) takes
    /// the server.
    pub fn scheduler(&self) -> ServerScheduler<R, S> {
        self.state.draft.clone()
    }

    /// The chat room coordinator.
    pub fn chat_rooms(&self) -> Arc<ServerCoordinator<R>> {
        Arc::clone(&self.state.chat)
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each.
    /// The WebSocket upgrade runs inside that task, so a client stuck in
    /// the handshake only holds up itself. Runs until the process is
    /// terminated.
    pub async fn run(mut self) -> Result<(), LeagueHubError> {
        tracing::info!(addr = ?self.local_addr().ok(), "leaguehub server running");

        loop {
            match self.transport.accept_pending().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        let peer = pending.peer_addr();
                        let conn = match pending.upgrade().await {
                            Ok(conn) => conn,
                            Err(e) => {
                                tracing::debug!(%peer, error = %e, "handshake failed");
                                return;
                            }
                        };
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
