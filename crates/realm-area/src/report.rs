//! Outcomes of the bulk operations.

use realm_protocol::{AreaId, PlayerId};
use serde::Serialize;

use crate::{AreaError, AreaState};

/// What [`sync_acquired_players`](crate::Area::sync_acquired_players)
/// corrected.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Locks held in the ledger for players this area didn't hold; released.
    pub released: Vec<PlayerId>,
    /// Orphaned locks whose release failed. They'll be retried next run.
    pub release_failures: Vec<(PlayerId, AreaError)>,
    /// Players held locally without a lock; force-evicted.
    pub evicted: Vec<PlayerId>,
}

impl SyncReport {
    /// Returns `true` if the ledger and the area already agreed.
    pub fn is_noop(&self) -> bool {
        self.released.is_empty() && self.release_failures.is_empty() && self.evicted.is_empty()
    }
}

/// What [`save_players`](crate::Area::save_players) did.
#[derive(Debug, Default)]
pub struct SaveReport {
    /// The reconciliation that ran first.
    pub sync: SyncReport,
    /// Players whose snapshot was written.
    pub saved: Vec<PlayerId>,
    /// Players whose save failed; their previous snapshot is unchanged.
    pub failures: Vec<(PlayerId, AreaError)>,
}

impl SaveReport {
    /// Returns `true` if every held player was saved.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A point-in-time summary of an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaInfo {
    pub area_id: Option<AreaId>,
    pub state: AreaState,
    pub player_count: usize,
}
