//! In-process ownership ledger.
//!
//! Holds the lock table and snapshot store of a single process. Useful
//! for one-host deployments, demos and tests; the fault switches let
//! tests stand in for a flaky remote backend.

use std::collections::{HashMap, HashSet};

use realm_protocol::{AreaId, Codec, JsonCodec, PlayerId, PlayerSnapshot};
use tokio::sync::Mutex;

use crate::{LedgerError, OwnershipLedger};

/// Failures to inject, keyed by operation.
#[derive(Debug, Default)]
struct Faults {
    unavailable: bool,
    release: HashSet<PlayerId>,
    load: HashSet<PlayerId>,
    save: HashSet<PlayerId>,
}

#[derive(Debug, Default)]
struct LedgerState {
    /// Lock table: which area holds each player.
    owners: HashMap<PlayerId, AreaId>,
    /// Snapshot store, encoded the way a remote store would keep it.
    snapshots: HashMap<PlayerId, Vec<u8>>,
    /// Every release call seen, successful or not.
    release_attempts: HashMap<PlayerId, usize>,
    faults: Faults,
}

/// An [`OwnershipLedger`] kept in memory.
///
/// - `acquire` is re-entrant for the owning area and fails with
///   [`LedgerError::AlreadyOwned`] for any other area.
/// - `release` only frees a lock held by the caller; anything else is a
///   silent no-op.
/// - Loading a player that was never saved yields an empty snapshot,
///   unless the ledger was built with [`MemoryLedger::strict`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
    codec: JsonCodec,
    strict_snapshots: bool,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ledger where loading an unsaved player fails
    /// with [`LedgerError::NotFound`].
    pub fn strict() -> Self {
        Self {
            strict_snapshots: true,
            ..Self::default()
        }
    }

    // -- Administration ---------------------------------------------------

    /// Records `area_id` as the owner of `player_id`, overriding any
    /// current owner. Simulates a lock taken by a previous incarnation.
    pub async fn assign(&self, player_id: PlayerId, area_id: AreaId) {
        self.state.lock().await.owners.insert(player_id, area_id);
    }

    /// Drops the player's lock regardless of owner. Simulates a lock lost
    /// to expiry or operator action.
    pub async fn revoke(&self, player_id: &PlayerId) -> Option<AreaId> {
        self.state.lock().await.owners.remove(player_id)
    }

    /// Current owner of a player's lock.
    pub async fn owner_of(&self, player_id: &PlayerId) -> Option<AreaId> {
        self.state.lock().await.owners.get(player_id).cloned()
    }

    /// Stores a snapshot directly, bypassing ownership.
    pub async fn put_snapshot(&self, snapshot: &PlayerSnapshot) -> Result<(), LedgerError> {
        let bytes = self.codec.encode(snapshot)?;
        self.state
            .lock()
            .await
            .snapshots
            .insert(snapshot.player_id.clone(), bytes);
        Ok(())
    }

    /// Reads a stored snapshot directly, bypassing ownership and faults.
    pub async fn snapshot(&self, player_id: &PlayerId) -> Option<PlayerSnapshot> {
        let state = self.state.lock().await;
        let bytes = state.snapshots.get(player_id)?;
        self.codec.decode(bytes).ok()
    }

    /// How many times `release` was called for the player.
    pub async fn release_attempts(&self, player_id: &PlayerId) -> usize {
        self.state
            .lock()
            .await
            .release_attempts
            .get(player_id)
            .copied()
            .unwrap_or(0)
    }

    // -- Fault injection --------------------------------------------------

    /// Makes every operation fail with [`LedgerError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.faults.unavailable = unavailable;
    }

    /// Makes `release` fail for one player.
    pub async fn fail_release_for(&self, player_id: PlayerId) {
        self.state.lock().await.faults.release.insert(player_id);
    }

    /// Makes `load_snapshot` fail for one player.
    pub async fn fail_load_for(&self, player_id: PlayerId) {
        self.state.lock().await.faults.load.insert(player_id);
    }

    /// Makes `save_snapshot` fail for one player.
    pub async fn fail_save_for(&self, player_id: PlayerId) {
        self.state.lock().await.faults.save.insert(player_id);
    }

    /// Clears every injected fault.
    pub async fn heal(&self) {
        self.state.lock().await.faults = Faults::default();
    }

    fn decode_or_empty(
        &self,
        state: &LedgerState,
        player_id: &PlayerId,
    ) -> Result<PlayerSnapshot, LedgerError> {
        match state.snapshots.get(player_id) {
            Some(bytes) => Ok(self.codec.decode(bytes)?),
            None if self.strict_snapshots => Err(LedgerError::NotFound(player_id.clone())),
            None => Ok(PlayerSnapshot::empty(player_id.clone())),
        }
    }
}

fn check_available(state: &LedgerState) -> Result<(), LedgerError> {
    if state.faults.unavailable {
        return Err(LedgerError::Unavailable("memory ledger offline".into()));
    }
    Ok(())
}

impl OwnershipLedger for MemoryLedger {
    async fn acquire(&self, player_id: &PlayerId, area_id: &AreaId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        check_available(&state)?;

        match state.owners.get(player_id) {
            Some(owner) if owner != area_id => Err(LedgerError::AlreadyOwned {
                player_id: player_id.clone(),
                owner: owner.clone(),
            }),
            Some(_) => Ok(()),
            None => {
                state.owners.insert(player_id.clone(), area_id.clone());
                tracing::trace!(%player_id, %area_id, "lock acquired");
                Ok(())
            }
        }
    }

    async fn release(&self, player_id: &PlayerId, area_id: &AreaId) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        *state.release_attempts.entry(player_id.clone()).or_default() += 1;
        check_available(&state)?;
        if state.faults.release.contains(player_id) {
            return Err(LedgerError::Unavailable(format!(
                "release of {player_id} failed"
            )));
        }

        if state.owners.get(player_id) == Some(area_id) {
            state.owners.remove(player_id);
            tracing::trace!(%player_id, %area_id, "lock released");
        }
        Ok(())
    }

    async fn list_owned(&self, area_id: &AreaId) -> Result<HashSet<PlayerId>, LedgerError> {
        let state = self.state.lock().await;
        check_available(&state)?;
        Ok(state
            .owners
            .iter()
            .filter(|(_, owner)| *owner == area_id)
            .map(|(player_id, _)| player_id.clone())
            .collect())
    }

    async fn load_snapshot(
        &self,
        player_id: &PlayerId,
        _area_id: &AreaId,
    ) -> Result<PlayerSnapshot, LedgerError> {
        let state = self.state.lock().await;
        check_available(&state)?;
        if state.faults.load.contains(player_id) {
            return Err(LedgerError::Unavailable(format!("load of {player_id} failed")));
        }
        self.decode_or_empty(&state, player_id)
    }

    async fn save_snapshot(
        &self,
        snapshot: &PlayerSnapshot,
        area_id: &AreaId,
    ) -> Result<(), LedgerError> {
        let player_id = &snapshot.player_id;
        let mut state = self.state.lock().await;
        check_available(&state)?;
        if state.faults.save.contains(player_id) {
            return Err(LedgerError::Unavailable(format!("save of {player_id} failed")));
        }
        if let Some(owner) = state.owners.get(player_id) {
            if owner != area_id {
                return Err(LedgerError::AlreadyOwned {
                    player_id: player_id.clone(),
                    owner: owner.clone(),
                });
            }
        }

        let bytes = self.codec.encode(snapshot)?;
        state.snapshots.insert(player_id.clone(), bytes);
        Ok(())
    }

    async fn load_all_owned(&self, area_id: &AreaId) -> Result<Vec<PlayerSnapshot>, LedgerError> {
        let state = self.state.lock().await;
        check_available(&state)?;
        state
            .owners
            .iter()
            .filter(|(_, owner)| *owner == area_id)
            .map(|(player_id, _)| self.decode_or_empty(&state, player_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    fn aid(id: &str) -> AreaId {
        AreaId::new(id)
    }

    #[tokio::test]
    async fn test_acquire_free_lock_records_owner() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
        assert_eq!(ledger.owner_of(&pid("p1")).await, Some(aid("A1")));
    }

    #[tokio::test]
    async fn test_acquire_same_area_is_reentrant() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_acquire_other_area_returns_already_owned() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();

        let result = ledger.acquire(&pid("p1"), &aid("A2")).await;

        assert!(matches!(
            result,
            Err(LedgerError::AlreadyOwned { owner, .. }) if owner == aid("A1")
        ));
    }

    #[tokio::test]
    async fn test_release_unheld_lock_is_ok() {
        let ledger = MemoryLedger::new();
        ledger.release(&pid("p1"), &aid("A1")).await.unwrap();
        assert_eq!(ledger.release_attempts(&pid("p1")).await, 1);
    }

    #[tokio::test]
    async fn test_release_by_non_owner_keeps_lock() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();

        ledger.release(&pid("p1"), &aid("A2")).await.unwrap();

        assert_eq!(ledger.owner_of(&pid("p1")).await, Some(aid("A1")));
    }

    #[tokio::test]
    async fn test_release_injected_fault_still_counts_attempt() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
        ledger.fail_release_for(pid("p1")).await;

        let result = ledger.release(&pid("p1"), &aid("A1")).await;

        assert!(matches!(result, Err(LedgerError::Unavailable(_))));
        assert_eq!(ledger.release_attempts(&pid("p1")).await, 1);
        assert_eq!(ledger.owner_of(&pid("p1")).await, Some(aid("A1")));
    }

    #[tokio::test]
    async fn test_list_owned_filters_by_area() {
        let ledger = MemoryLedger::new();
        ledger.assign(pid("p1"), aid("A1")).await;
        ledger.assign(pid("p2"), aid("A1")).await;
        ledger.assign(pid("p3"), aid("A2")).await;

        let owned = ledger.list_owned(&aid("A1")).await.unwrap();

        assert_eq!(owned, HashSet::from([pid("p1"), pid("p2")]));
    }

    #[tokio::test]
    async fn test_load_snapshot_unsaved_player_is_empty() {
        let ledger = MemoryLedger::new();
        let snapshot = ledger.load_snapshot(&pid("p1"), &aid("A1")).await.unwrap();
        assert_eq!(snapshot, PlayerSnapshot::empty(pid("p1")));
    }

    #[tokio::test]
    async fn test_load_snapshot_strict_unsaved_player_is_not_found() {
        let ledger = MemoryLedger::strict();
        let result = ledger.load_snapshot(&pid("p1"), &aid("A1")).await;
        assert!(matches!(result, Err(LedgerError::NotFound(p)) if p == pid("p1")));
    }

    #[tokio::test]
    async fn test_save_then_load_returns_saved_data() {
        let ledger = MemoryLedger::new();
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
        let snapshot = PlayerSnapshot::new(pid("p1"), json!({ "gold": 40 }));

        ledger.save_snapshot(&snapshot, &aid("A1")).await.unwrap();
        let loaded = ledger.load_snapshot(&pid("p1"), &aid("A1")).await.unwrap();

        assert_eq!(loaded.data["gold"], 40);
    }

    #[tokio::test]
    async fn test_save_snapshot_for_player_owned_elsewhere_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger.assign(pid("p1"), aid("A2")).await;
        let snapshot = PlayerSnapshot::empty(pid("p1"));

        let result = ledger.save_snapshot(&snapshot, &aid("A1")).await;

        assert!(matches!(result, Err(LedgerError::AlreadyOwned { .. })));
        assert!(ledger.snapshot(&pid("p1")).await.is_none());
    }

    #[tokio::test]
    async fn test_load_all_owned_returns_only_this_areas_players() {
        let ledger = MemoryLedger::new();
        ledger.assign(pid("p1"), aid("A1")).await;
        ledger.assign(pid("p2"), aid("A2")).await;
        ledger
            .put_snapshot(&PlayerSnapshot::new(pid("p1"), json!({ "lvl": 2 })))
            .await
            .unwrap();

        let all = ledger.load_all_owned(&aid("A1")).await.unwrap();

        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data["lvl"], 2);
    }

    #[tokio::test]
    async fn test_unavailable_fails_every_operation_until_healed() {
        let ledger = MemoryLedger::new();
        ledger.set_unavailable(true).await;

        assert!(matches!(
            ledger.acquire(&pid("p1"), &aid("A1")).await,
            Err(LedgerError::Unavailable(_))
        ));
        assert!(ledger.list_owned(&aid("A1")).await.is_err());

        ledger.heal().await;
        ledger.acquire(&pid("p1"), &aid("A1")).await.unwrap();
    }
}
