//! Players for Realm.
//!
//! A player is the unit an area admits and evicts. This crate defines
//! what an area needs from one:
//!
//! 1. **Lifecycle**: `start`, `stop`, `destroy` ([`Player`] trait)
//! 2. **Persistence**: build from and produce a [`PlayerSnapshot`]
//! 3. **Events**: `connect`, `disconnect`, `notify-request`, delivered
//!    through a [`PlayerEvents`] emitter with token-based subscription
//!
//! # How it fits in the stack
//!
//! ```text
//! Area (above)   ← subscribes to player events, drives start/stop
//!     ↕
//! Player (this crate)   ← owns its state, emits events
//!     ↕
//! Protocol (below)   ← PlayerId, ConnectionId, snapshots
//! ```
//!
//! [`PlayerSnapshot`]: realm_protocol::PlayerSnapshot

mod error;
mod events;
mod player;

pub use error::PlayerError;
pub use events::{EventKind, Listener, PlayerEvent, PlayerEvents, SubscriptionToken};
pub use player::Player;
