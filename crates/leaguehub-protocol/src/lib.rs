//! Wire protocol for leaguehub.
//!
//! This crate defines what travels over a room channel:
//!
//! - **Identifiers** ([`LeagueId`], [`UserId`]): newtypes over the
//!   string ids the league database hands out.
//! - **Events** ([`ServerEvent`]): everything the server pushes to a
//!   connected client: presence, draft progress, chat.
//! - **Client messages** ([`ClientMessage`]): what a client may send.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to/from bytes.
//!
//! The protocol layer knows nothing about sockets or locks. It only
//! knows how messages look on the wire.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, DraftState, LeagueId, ServerEvent, StartOutcome,
    TurnEndReason, UserId,
};
