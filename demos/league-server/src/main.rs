//! Demo leaguehub server.
//!
//! ```text
//! LEAGUEHUB_ROSTERS="l1:alice,bob,carol" LEAGUEHUB_TURN_TIMEOUT_SECS=15 \
//!     cargo run -p league-server
//! ```
//!
//! Then connect to `ws://127.0.0.1:8000/draft/ws/l1/alice` and send
//! `{"type":"draft.start"}`.

mod settings;

use leaguehub::prelude::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::settings::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load()?;
    let roster = settings.roster()?;
    if roster.league_count() == 0 {
        tracing::warn!("LEAGUEHUB_ROSTERS is empty, every connection will be refused");
    }

    let server = LeagueHubServer::builder()
        .bind(&settings.bind)
        .draft_config(settings.draft_config())
        .build(roster, MemoryDraftStore::new())
        .await?;
    tracing::info!(addr = %server.local_addr()?, "listening");

    server.run().await?;
    Ok(())
}
