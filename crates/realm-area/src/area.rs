//! The area: a set of players held under the cluster ownership lock.
//!
//! An area admits a player only after acquiring its lock in the ledger,
//! and lets go of the lock only after persisting (or deleting) it. Every
//! operation takes `&mut self`, so calls on one area never interleave;
//! [`spawn_area`](crate::spawn_area) puts that behind a command channel
//! for concurrent callers.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;
use realm_group::{BroadcastGroup, GroupHandle};
use realm_ledger::OwnershipLedger;
use realm_player::{Player, PlayerError};
use realm_protocol::{AreaDocument, AreaId, ConnectionId, Message, NotifyTarget, PlayerId, Route};
use tracing::{debug, info, warn};

use crate::wiring::{Notifier, Subscriptions};
use crate::{
    AreaConfig, AreaError, AreaInfo, AreaLogic, AreaOptions, AreaState, Lifecycle, SaveReport,
    SyncReport,
};

/// How a player leaves: see [`Area::quit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuitOptions {
    /// Drop the player locally without touching the ledger.
    pub force: bool,
    /// Destroy the player instead of saving it.
    pub remove: bool,
}

impl QuitOptions {
    /// Save and release. The normal way out.
    pub fn save() -> Self {
        Self::default()
    }

    /// Destroy and release.
    pub fn remove() -> Self {
        Self {
            force: false,
            remove: true,
        }
    }

    /// Local drop only; the lock stays for reconciliation.
    pub fn force() -> Self {
        Self {
            force: true,
            remove: false,
        }
    }
}

// How far a join got, so a rollback undoes exactly that much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Locked,
    Held,
    Started,
}

/// A shard of the player population.
///
/// `A` supplies the hooks and the player type; `L` and `B` are the
/// ownership ledger and the broadcast group service, shared with every
/// other area of the process.
pub struct Area<A: AreaLogic, L, B> {
    logic: A,
    ledger: Arc<L>,
    groups: Arc<B>,
    config: AreaConfig,
    area_id: Option<AreaId>,
    state: AreaState,
    players: HashMap<PlayerId, A::Player>,
    subscriptions: Subscriptions,
    group: Option<GroupHandle>,
}

impl<A, L, B> Area<A, L, B>
where
    A: AreaLogic,
    L: OwnershipLedger,
    B: BroadcastGroup,
{
    /// Creates an Uninitialized area.
    pub fn new(logic: A, ledger: Arc<L>, groups: Arc<B>, config: AreaConfig) -> Self {
        Self {
            logic,
            ledger,
            groups,
            config: config.validated(),
            area_id: None,
            state: AreaState::Uninitialized,
            players: HashMap::new(),
            subscriptions: Subscriptions::default(),
            group: None,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Assigns the area's identity and runs `on_init`.
    ///
    /// Uninitialized → Initialized. If `on_init` fails the area stays
    /// Uninitialized without an identity.
    pub async fn init(&mut self, options: AreaOptions) -> Result<(), AreaError> {
        let next = self.check(Lifecycle::Init)?;
        let area_id = options.into_area_id();
        self.logic.on_init(&area_id).await?;

        info!(%area_id, "area initialized");
        self.area_id = Some(area_id);
        self.state = next;
        Ok(())
    }

    /// Creates the broadcast group, starts every held player and wires
    /// their events, then runs `on_start`.
    ///
    /// Initialized | Stopped → Running. Players start concurrently. If
    /// any fails to start, or `on_start` fails, the first error is
    /// returned with the state unchanged: listeners are removed again and
    /// every player that did start is stopped. The group is kept for the
    /// next attempt.
    pub async fn start(&mut self) -> Result<(), AreaError> {
        let next = self.check(Lifecycle::Start)?;
        let area_id = self.require_id(Lifecycle::Start.as_str())?;

        let group = self
            .groups
            .create_group(&self.config.group_name(&area_id))
            .await?;
        self.group = Some(group);

        let (started, failed) = self.start_players(&area_id).await;
        if let Some(err) = failed.into_iter().next() {
            self.stop_players(&area_id, &started).await;
            return Err(err.into());
        }

        self.wire_all();
        if let Err(e) = self.logic.on_start(&area_id).await {
            self.unwire_all();
            self.stop_players(&area_id, &started).await;
            return Err(e);
        }

        self.state = next;
        info!(%area_id, players = self.players.len(), "area started");
        Ok(())
    }

    /// Runs `on_stop`, removes all event listeners, stops every player
    /// and destroys the group.
    ///
    /// Running → Stopped. A failing `on_stop` aborts with the area still
    /// Running. After that every step runs even if an earlier one failed:
    /// the area ends Stopped and the first player or group error is
    /// returned.
    pub async fn stop(&mut self) -> Result<(), AreaError> {
        let next = self.check(Lifecycle::Stop)?;
        let area_id = self.require_id(Lifecycle::Stop.as_str())?;
        self.logic.on_stop(&area_id).await?;

        self.unwire_all();
        let held = self.player_ids();
        let mut first_error: Option<AreaError> = self
            .stop_players(&area_id, &held)
            .await
            .into_iter()
            .next()
            .map(AreaError::from);

        if let Some(group) = self.group.take() {
            if let Err(e) = self.groups.destroy_group(group.name()).await {
                warn!(%area_id, group = group.name(), error = %e, "failed to destroy group");
                first_error.get_or_insert(e.into());
            }
        }

        self.state = next;
        info!(%area_id, players = self.players.len(), "area stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Saves all players (reconciling first), stamps the area's identity
    /// into `document` and runs `on_serialize`.
    ///
    /// Allowed only when Stopped; the state is unchanged. Individual
    /// player save failures don't fail the call and are listed in the
    /// report.
    pub async fn serialize(&mut self, document: &mut AreaDocument) -> Result<SaveReport, AreaError> {
        self.check(Lifecycle::Serialize)?;
        let area_id = self.require_id(Lifecycle::Serialize.as_str())?;

        let report = self.save_players().await?;
        document.area_id = Some(area_id.clone());
        self.logic.on_serialize(&area_id, document).await?;

        debug!(%area_id, saved = report.saved.len(), "area serialized");
        Ok(report)
    }

    /// Loads every player the ledger says this area owns, then runs
    /// `on_deserialize`.
    ///
    /// Allowed only when Initialized; the state is unchanged. Returns the
    /// number of players loaded.
    pub async fn deserialize(&mut self, document: &AreaDocument) -> Result<usize, AreaError> {
        self.check(Lifecycle::Deserialize)?;
        let area_id = self.require_id(Lifecycle::Deserialize.as_str())?;

        if let Some(saved_id) = &document.area_id {
            if *saved_id != area_id {
                warn!(%area_id, %saved_id, "deserializing a document saved by another area");
            }
        }

        let loaded = self.load_players().await?;
        self.logic.on_deserialize(&area_id, document).await?;

        debug!(%area_id, loaded, "area deserialized");
        Ok(loaded)
    }

    /// Runs `on_destroy` and makes the area Destroyed.
    ///
    /// Stopped → Destroyed. Fails with
    /// [`PreconditionFailed`](AreaError::PreconditionFailed) while any
    /// player is still held, whatever the state.
    pub async fn destroy(&mut self) -> Result<(), AreaError> {
        if !self.players.is_empty() {
            return Err(AreaError::PreconditionFailed(format!(
                "area still holds {} players",
                self.players.len()
            )));
        }
        let next = self.check(Lifecycle::Destroy)?;
        let area_id = self.require_id(Lifecycle::Destroy.as_str())?;
        self.logic.on_destroy(&area_id).await?;

        self.state = next;
        info!(%area_id, "area destroyed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Admits a player.
    ///
    /// Acquires the player's lock, runs `before_join`, loads its
    /// snapshot, holds and wires it, starts it and runs `on_join`. Only
    /// allowed while Running.
    ///
    /// A lock held by another area fails with
    /// [`LockConflict`](AreaError::LockConflict) and changes nothing. Any
    /// later failure is rolled back (listeners removed, player stopped if
    /// it started, player dropped, lock released) before the error is
    /// returned. A failed release during rollback is only logged; the
    /// next reconciliation clears the lock.
    pub async fn join(&mut self, player_id: PlayerId) -> Result<(), AreaError> {
        if !self.state.accepts_join() {
            return Err(self.invalid("join"));
        }
        let area_id = self.require_id("join")?;
        if self.players.contains_key(&player_id) {
            return Err(AreaError::PreconditionFailed(format!(
                "player {player_id} already in area {area_id}"
            )));
        }

        self.ledger.acquire(&player_id, &area_id).await?;

        let mut stage = Admission::Locked;
        if let Err(e) = self.admit(&area_id, &player_id, &mut stage).await {
            warn!(%area_id, %player_id, error = %e, "join failed, rolling back");
            self.roll_back_join(&area_id, &player_id, stage).await;
            return Err(e);
        }

        info!(%area_id, %player_id, players = self.players.len(), "player joined");
        Ok(())
    }

    async fn admit(
        &mut self,
        area_id: &AreaId,
        player_id: &PlayerId,
        stage: &mut Admission,
    ) -> Result<(), AreaError> {
        self.logic.before_join(area_id, player_id).await?;

        let snapshot = self.ledger.load_snapshot(player_id, area_id).await?;
        let player = A::Player::from_snapshot(snapshot);
        if let Some(notifier) = self.notifier() {
            self.subscriptions.wire(&player, &notifier);
        }
        self.players.insert(player_id.clone(), player);
        *stage = Admission::Held;

        if let Some(player) = self.players.get(player_id) {
            player.start().await?;
        }
        *stage = Admission::Started;

        self.logic.on_join(area_id, player_id).await
    }

    async fn roll_back_join(&mut self, area_id: &AreaId, player_id: &PlayerId, stage: Admission) {
        if let Some(player) = self.players.remove(player_id) {
            self.subscriptions.unwire(&player);
            if stage == Admission::Started {
                if let Err(e) = player.stop().await {
                    warn!(%area_id, %player_id, error = %e, "failed to stop player during rollback");
                }
            }
        }
        if let Err(e) = self.ledger.release(player_id, area_id).await {
            warn!(
                %area_id, %player_id, error = %e,
                "failed to release lock during rollback, leaving it for reconciliation"
            );
        }
    }

    /// Evicts a player.
    ///
    /// A player this area doesn't hold is ignored with a warning.
    ///
    /// With `force`, the player's listeners are removed and it is dropped
    /// on the spot in any state: no hook, no stop, no ledger call. Its
    /// lock stays until the next reconciliation.
    ///
    /// Otherwise (Initialized, Running or Stopped): `before_quit`; remove
    /// listeners; stop the player; destroy it if `remove`, else save its
    /// snapshot; release the lock; take it out of the group; drop it;
    /// `on_quit`. If any step up to the release fails, the player stays
    /// held and the error is returned. In a Running area it is then
    /// started again if it had been stopped, and re-wired.
    pub async fn quit(&mut self, player_id: &PlayerId, options: QuitOptions) -> Result<(), AreaError> {
        if !self.players.contains_key(player_id) {
            warn!(area_id = ?self.area_id, %player_id, "quit for player not in area, ignoring");
            return Ok(());
        }
        if options.force {
            self.force_quit(player_id).await;
            return Ok(());
        }
        if !self.state.accepts_quit() {
            return Err(self.invalid("quit"));
        }
        let area_id = self.require_id("quit")?;

        self.logic.before_quit(&area_id, player_id).await?;

        let mut stopped = false;
        if let Err(e) = self.evict(&area_id, player_id, options.remove, &mut stopped).await {
            warn!(%area_id, %player_id, error = %e, "quit failed, player stays");
            if self.state.is_running() {
                self.resume(&area_id, player_id, stopped).await;
            }
            return Err(e);
        }

        self.leave_group(player_id).await;
        self.players.remove(player_id);
        info!(%area_id, %player_id, removed = options.remove, players = self.players.len(), "player quit");
        self.logic.on_quit(&area_id, player_id).await
    }

    async fn evict(
        &mut self,
        area_id: &AreaId,
        player_id: &PlayerId,
        remove: bool,
        stopped: &mut bool,
    ) -> Result<(), AreaError> {
        let Some(player) = self.players.get(player_id) else {
            return Ok(());
        };
        self.subscriptions.unwire(player);
        player.stop().await?;
        *stopped = true;
        if remove {
            player.destroy().await?;
        } else {
            self.ledger.save_snapshot(&player.snapshot(), area_id).await?;
        }
        self.ledger.release(player_id, area_id).await?;
        Ok(())
    }

    // Undoes a failed eviction in a Running area.
    async fn resume(&mut self, area_id: &AreaId, player_id: &PlayerId, stopped: bool) {
        if stopped {
            if let Some(player) = self.players.get(player_id) {
                if let Err(e) = player.start().await {
                    warn!(%area_id, %player_id, error = %e, "failed to restart player after failed quit");
                }
            }
        }
        self.rewire(player_id);
    }

    /// Drops a player locally. Never fails and never touches the ledger.
    ///
    /// The player's group membership is removed on a best-effort basis.
    /// Returns `false` if the player wasn't held.
    pub async fn force_quit(&mut self, player_id: &PlayerId) -> bool {
        let Some(player) = self.players.remove(player_id) else {
            return false;
        };
        self.subscriptions.unwire(&player);
        self.leave_group(player_id).await;
        warn!(
            area_id = ?self.area_id, %player_id,
            "player force-evicted, lock left for reconciliation"
        );
        true
    }

    /// Hands a connection to a held player, which emits `connect`.
    ///
    /// Returns how many listeners saw the event (0 unless Running).
    pub async fn connect_player(
        &self,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<usize, AreaError> {
        Ok(self.get_player(player_id)?.connect(connection).await)
    }

    /// Tells a held player its connection is gone; it emits `disconnect`.
    pub async fn disconnect_player(&self, player_id: &PlayerId) -> Result<usize, AreaError> {
        Ok(self.get_player(player_id)?.disconnect().await)
    }

    // -----------------------------------------------------------------------
    // Reconciliation and persistence
    // -----------------------------------------------------------------------

    /// Makes the held set agree with the ledger.
    ///
    /// - Locks owned in the ledger for players not held here are
    ///   released.
    /// - Players held here without a lock are force-evicted.
    ///
    /// Releases run concurrently. A failed release is reported and left
    /// for the next run. Fails only if the owned set can't be listed, in
    /// which case nothing changes. Allowed in any state once an identity
    /// is assigned.
    pub async fn sync_acquired_players(&mut self) -> Result<SyncReport, AreaError> {
        let area_id = self.require_id("sync")?;
        let owned = self.ledger.list_owned(&area_id).await?;

        let orphaned_locks: Vec<PlayerId> = owned
            .iter()
            .filter(|id| !self.players.contains_key(*id))
            .cloned()
            .collect();
        let unlocked: Vec<PlayerId> = self
            .players
            .keys()
            .filter(|id| !owned.contains(*id))
            .cloned()
            .collect();

        let ledger = Arc::clone(&self.ledger);
        let releases = join_all(orphaned_locks.into_iter().map(|player_id| {
            let ledger = &ledger;
            let area_id = &area_id;
            async move {
                let result = ledger.release(&player_id, area_id).await;
                (player_id, result)
            }
        }));

        let mut report = SyncReport::default();
        for player_id in unlocked {
            if self.force_quit(&player_id).await {
                report.evicted.push(player_id);
            }
        }

        for (player_id, result) in releases.await {
            match result {
                Ok(()) => report.released.push(player_id),
                Err(e) => {
                    warn!(%area_id, %player_id, error = %e, "failed to release orphaned lock");
                    report.release_failures.push((player_id, e.into()));
                }
            }
        }

        if report.is_noop() {
            debug!(%area_id, "ledger in sync");
        } else {
            info!(
                %area_id,
                released = report.released.len(),
                release_failures = report.release_failures.len(),
                evicted = report.evicted.len(),
                "reconciled with ledger"
            );
        }
        Ok(report)
    }

    /// Replaces the held set with every player the ledger says this area
    /// owns, built from their snapshots. Returns the number loaded.
    ///
    /// Fails atomically: if the ledger call fails the held set is
    /// unchanged.
    pub async fn load_players(&mut self) -> Result<usize, AreaError> {
        let area_id = self.require_id("load players")?;
        let snapshots = self.ledger.load_all_owned(&area_id).await?;

        for player in self.players.values() {
            self.subscriptions.unwire(player);
        }
        self.players = snapshots
            .into_iter()
            .map(|snapshot| (snapshot.player_id.clone(), A::Player::from_snapshot(snapshot)))
            .collect();
        if self.state.is_running() {
            self.wire_all();
        }

        debug!(%area_id, players = self.players.len(), "players loaded");
        Ok(self.players.len())
    }

    /// Reconciles with the ledger, then saves every held player's
    /// snapshot concurrently.
    ///
    /// Fails only if reconciliation fails; individual save failures are
    /// in the report.
    pub async fn save_players(&mut self) -> Result<SaveReport, AreaError> {
        let sync = self.sync_acquired_players().await?;
        let area_id = self.require_id("save players")?;

        let ledger = &*self.ledger;
        let area_ref = &area_id;
        let results = join_all(self.players.values().map(|player| async move {
            let snapshot = player.snapshot();
            let result = ledger.save_snapshot(&snapshot, area_ref).await;
            (snapshot.player_id, result)
        }))
        .await;

        let mut report = SaveReport {
            sync,
            ..SaveReport::default()
        };
        for (player_id, result) in results {
            match result {
                Ok(()) => report.saved.push(player_id),
                Err(e) => {
                    warn!(%area_id, %player_id, error = %e, "failed to save player");
                    report.failures.push((player_id, e.into()));
                }
            }
        }
        debug!(%area_id, saved = report.saved.len(), failed = report.failures.len(), "players saved");
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------------

    /// Pushes `message` on `route` to the whole area or to specific
    /// players.
    ///
    /// Needs the broadcast group, so only works from `start` until
    /// `stop`. Listed players this area doesn't hold, or that have no
    /// live connection, are skipped.
    pub async fn notify(
        &self,
        target: impl Into<NotifyTarget>,
        route: impl Into<Route>,
        message: Message,
    ) -> Result<(), AreaError> {
        let notifier = self.notifier().ok_or_else(|| self.invalid("notify"))?;
        let route: Route = route.into();
        let target = match target.into().into_players() {
            None => NotifyTarget::All,
            Some(players) => {
                let (held, absent): (Vec<PlayerId>, Vec<PlayerId>) =
                    players.into_iter().partition(|id| self.players.contains_key(id));
                if !absent.is_empty() {
                    debug!(area_id = ?self.area_id, ?absent, %route, "notify targets not in area, skipping");
                }
                if held.is_empty() {
                    return Ok(());
                }
                NotifyTarget::Players(held)
            }
        };
        notifier.notify(target, &route, &message).await
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The area's identity, once initialized.
    pub fn area_id(&self) -> Option<&AreaId> {
        self.area_id.as_ref()
    }

    pub fn state(&self) -> AreaState {
        self.state
    }

    pub fn config(&self) -> &AreaConfig {
        &self.config
    }

    /// The broadcast group, while Running.
    pub fn group(&self) -> Option<&GroupHandle> {
        self.group.as_ref()
    }

    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.players.contains_key(player_id)
    }

    /// A held player, or [`NotPresent`](AreaError::NotPresent).
    pub fn get_player(&self, player_id: &PlayerId) -> Result<&A::Player, AreaError> {
        self.players
            .get(player_id)
            .ok_or_else(|| AreaError::NotPresent(player_id.clone()))
    }

    /// Held player ids, sorted.
    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<PlayerId> = self.players.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Returns `true` if this area has listeners on the player.
    pub fn is_subscribed(&self, player_id: &PlayerId) -> bool {
        self.subscriptions.is_wired(player_id)
    }

    pub fn info(&self) -> AreaInfo {
        AreaInfo {
            area_id: self.area_id.clone(),
            state: self.state,
            player_count: self.players.len(),
        }
    }

    pub fn logic(&self) -> &A {
        &self.logic
    }

    pub fn logic_mut(&mut self) -> &mut A {
        &mut self.logic
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check(&self, op: Lifecycle) -> Result<AreaState, AreaError> {
        self.state.after(op).ok_or_else(|| self.invalid(op.as_str()))
    }

    fn invalid(&self, operation: &'static str) -> AreaError {
        AreaError::InvalidState {
            operation,
            state: self.state,
        }
    }

    fn require_id(&self, operation: &'static str) -> Result<AreaId, AreaError> {
        self.area_id.clone().ok_or_else(|| self.invalid(operation))
    }

    fn notifier(&self) -> Option<Notifier<B>> {
        self.group
            .as_ref()
            .map(|group| Notifier::new(Arc::clone(&self.groups), group.clone()))
    }

    fn wire_all(&mut self) {
        let Some(notifier) = self.notifier() else {
            return;
        };
        for player in self.players.values() {
            self.subscriptions.wire(player, &notifier);
        }
    }

    fn unwire_all(&mut self) {
        for player in self.players.values() {
            self.subscriptions.unwire(player);
        }
        debug_assert!(self.subscriptions.is_empty());
    }

    fn rewire(&mut self, player_id: &PlayerId) {
        let Some(notifier) = self.notifier() else {
            return;
        };
        if let Some(player) = self.players.get(player_id) {
            self.subscriptions.wire(player, &notifier);
        }
    }

    // Takes a departing player's connection out of the group. Best effort:
    // the player is leaving either way.
    async fn leave_group(&self, player_id: &PlayerId) {
        let Some(group) = &self.group else {
            return;
        };
        if let Err(e) = self.groups.remove_member(group, player_id).await {
            warn!(area_id = ?self.area_id, %player_id, error = %e, "failed to remove player from group");
        }
    }

    /// Starts every held player. Returns the ids that started and the
    /// failures.
    async fn start_players(&self, area_id: &AreaId) -> (Vec<PlayerId>, Vec<PlayerError>) {
        let results = join_all(self.players.values().map(|player| async move {
            (player.id().clone(), player.start().await)
        }))
        .await;

        let mut started = Vec::with_capacity(results.len());
        let mut outcomes = Vec::with_capacity(results.len());
        for (player_id, result) in results {
            if result.is_ok() {
                started.push(player_id);
            }
            outcomes.push(result);
        }
        (started, failures(area_id, "start", outcomes))
    }

    async fn stop_players(&self, area_id: &AreaId, player_ids: &[PlayerId]) -> Vec<PlayerError> {
        let players = player_ids.iter().filter_map(|id| self.players.get(id));
        let results = join_all(players.map(|player| player.stop())).await;
        failures(area_id, "stop", results)
    }
}

fn failures(
    area_id: &AreaId,
    step: &'static str,
    results: Vec<Result<(), PlayerError>>,
) -> Vec<PlayerError> {
    results
        .into_iter()
        .filter_map(Result::err)
        .inspect(|e| warn!(%area_id, player_id = %e.player_id(), error = %e, "player {step} failed"))
        .collect()
}

impl<A: AreaLogic, L, B> std::fmt::Debug for Area<A, L, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Area")
            .field("area_id", &self.area_id)
            .field("state", &self.state)
            .field("players", &self.players.len())
            .finish_non_exhaustive()
    }
}
