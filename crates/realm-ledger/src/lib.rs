//! Player ownership ledger for Realm.
//!
//! The ledger is the cluster's source of truth for "which area holds
//! which player". It provides the [`OwnershipLedger`] trait that areas
//! are written against, and an in-process [`MemoryLedger`].
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryLedger`], backed by Tokio mutexes

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::LedgerError;
#[cfg(feature = "memory")]
pub use memory::MemoryLedger;

use std::collections::HashSet;
use std::future::Future;

use realm_protocol::{AreaId, PlayerId, PlayerSnapshot};

/// Cluster-wide exclusivity over players, plus their persisted snapshots.
///
/// At most one area holds a player's lock at a time. The ledger enforces
/// that; areas only react to the outcome of `acquire`.
///
/// Every method returns a `Send` future so an area driving the ledger
/// can live in its own task.
pub trait OwnershipLedger: Send + Sync + 'static {
    /// Takes the player's ownership lock for `area_id`.
    ///
    /// # Errors
    /// - [`LedgerError::AlreadyOwned`]: another area holds it
    /// - [`LedgerError::Unavailable`]: the backend failed
    fn acquire(
        &self,
        player_id: &PlayerId,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Gives the lock back. Idempotent: releasing an unheld lock is not
    /// an error.
    fn release(
        &self,
        player_id: &PlayerId,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// The players the ledger currently attributes to `area_id`.
    fn list_owned(
        &self,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<HashSet<PlayerId>, LedgerError>> + Send;

    /// Loads one player's snapshot.
    fn load_snapshot(
        &self,
        player_id: &PlayerId,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<PlayerSnapshot, LedgerError>> + Send;

    /// Persists one player's snapshot on behalf of `area_id`.
    fn save_snapshot(
        &self,
        snapshot: &PlayerSnapshot,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<(), LedgerError>> + Send;

    /// Loads the snapshot of every player `area_id` currently owns.
    fn load_all_owned(
        &self,
        area_id: &AreaId,
    ) -> impl Future<Output = Result<Vec<PlayerSnapshot>, LedgerError>> + Send;
}
