//! # Realm
//!
//! Sharded player areas under a cluster-wide ownership lock.
//!
//! An area holds a set of players. Before it admits one it takes the
//! player's lock in the ownership ledger, and it releases the lock only
//! after saving (or deleting) the player, so at most one area anywhere
//! holds a given player. Areas push messages to their players'
//! connections through a broadcast group, and reconcile with the ledger
//! when they find they've drifted apart.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use realm::prelude::*;
//!
//! realm::logging::init("info");
//! let host = RealmHost::in_memory().build();
//! let area = host
//!     .open_area(NoHooks::<MyPlayer>::new(), AreaOptions::with_id("plaza"))
//!     .await?;
//! area.join(PlayerId::new("ada")).await?;
//! area.notify(NotifyTarget::All, "chat", serde_json::json!({ "text": "hi" })).await?;
//! ```

mod error;
mod host;
pub mod logging;

pub use error::RealmError;
pub use host::{RealmHost, RealmHostBuilder};

pub use realm_area as area;
pub use realm_group as group;
pub use realm_ledger as ledger;
pub use realm_player as player;
pub use realm_protocol as protocol;

/// The types most hosts need.
pub mod prelude {
    pub use realm_area::{
        AreaConfig, AreaError, AreaHandle, AreaInfo, AreaLogic, AreaOptions, AreaState, NoHooks,
        QuitOptions,
    };
    pub use realm_group::{BroadcastGroup, MemoryGroups};
    pub use realm_ledger::{MemoryLedger, OwnershipLedger};
    pub use realm_player::{Player, PlayerError, PlayerEvents};
    pub use realm_protocol::{
        AreaDocument, AreaId, ConnectionId, Message, NotifyTarget, PlayerId, PlayerSnapshot, Route,
    };

    pub use crate::{RealmError, RealmHost};
}
