//! Shared vocabulary for Realm.
//!
//! This crate defines the values that cross crate boundaries:
//!
//! - **Identities** ([`AreaId`], [`PlayerId`], [`ConnectionId`]): who
//!   and where.
//! - **Payloads** ([`Route`], [`Message`], [`NotifyTarget`]): what gets
//!   pushed to players and to whom.
//! - **Persistence shapes** ([`PlayerSnapshot`], [`AreaDocument`]): what
//!   the ownership ledger stores and what an area serializes into.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those values become
//!   bytes for a backend.
//!
//! ```text
//! Area (core)  →  Ledger / Group backends  →  Protocol (this crate)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    AreaDocument, AreaId, ConnectionId, Message, NotifyTarget, PlayerId,
    PlayerSnapshot, Route,
};
