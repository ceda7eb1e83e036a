//! Areas for Realm.
//!
//! An area is one shard of the player population: it holds a set of
//! players, and holds each one only while it owns that player's lock in
//! the cluster-wide ownership ledger. Every running area also owns a
//! broadcast group through which it pushes messages to its players'
//! connections.
//!
//! # Key types
//!
//! - [`Area`]: lifecycle, join/quit, reconciliation, persistence, notify
//! - [`AreaLogic`]: the hooks area developers implement
//! - [`AreaState`]: lifecycle state machine
//! - [`AreaHandle`]: send commands to an area running in its own task
//! - [`AreaManager`]: spawns and tracks area actors
//! - [`AreaError`]: what can go wrong, and which failures to retry

mod actor;
mod area;
mod config;
mod error;
mod logic;
mod manager;
mod report;
mod wiring;

pub use actor::{AreaHandle, spawn_area};
pub use area::{Area, QuitOptions};
pub use config::{AreaConfig, AreaOptions, AreaState, Lifecycle};
pub use error::AreaError;
pub use logic::{AreaLogic, NoHooks};
pub use manager::AreaManager;
pub use report::{AreaInfo, SaveReport, SyncReport};
