//! The `AreaLogic` trait: the extension point for area developers.
//!
//! The area runs the mechanics (ownership locks, persistence, group
//! membership, player lifecycles); the developer fills in what happens
//! around them. Every hook has a no-op default, so an implementor only
//! writes the ones it cares about.

use std::future::Future;
use std::marker::PhantomData;

use realm_player::Player;
use realm_protocol::{AreaDocument, AreaId, PlayerId};

use crate::AreaError;

/// Hooks an area invokes around its lifecycle and membership changes.
///
/// Hooks run inside the area's operation, in order, and may fail. A
/// failing hook fails the operation:
///
/// - `on_init`, `on_start`, `on_stop`, `on_destroy`, `on_deserialize`,
///   `on_serialize` → the lifecycle operation fails (see each operation
///   for which state it leaves the area in).
/// - `before_join` → the join is rolled back and the lock released.
/// - `on_join` → the join is rolled back after the player has started.
/// - `before_quit` → nothing has been torn down yet; the player stays.
/// - `on_quit` → the player is already gone; only the error propagates.
///
/// # Example
///
/// ```rust,ignore
/// struct Lobby { joins: u64 }
///
/// impl AreaLogic for Lobby {
///     type Player = Visitor;
///
///     async fn on_join(&mut self, _area_id: &AreaId, _player_id: &PlayerId) -> Result<(), AreaError> {
///         self.joins += 1;
///         Ok(())
///     }
/// }
/// ```
pub trait AreaLogic: Send + Sync + 'static {
    /// The players this area holds.
    type Player: Player;

    /// After the identity is assigned, before the area is Initialized.
    fn on_init(&mut self, _area_id: &AreaId) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// After players are started and wired, before the area is Running.
    fn on_start(&mut self, _area_id: &AreaId) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// First step of `stop`, while the area still serves.
    fn on_stop(&mut self, _area_id: &AreaId) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// After players are saved; write area-level fields into `document`.
    fn on_serialize(
        &mut self,
        _area_id: &AreaId,
        _document: &mut AreaDocument,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// After players are loaded; read area-level fields from `document`.
    fn on_deserialize(
        &mut self,
        _area_id: &AreaId,
        _document: &AreaDocument,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// Last step before the area is Destroyed.
    fn on_destroy(&mut self, _area_id: &AreaId) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// The lock is held but nothing is loaded yet. Fail to veto the join.
    fn before_join(
        &mut self,
        _area_id: &AreaId,
        _player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// Before a normal eviction touches anything. Fail to veto it.
    fn before_quit(
        &mut self,
        _area_id: &AreaId,
        _player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// The player is held, wired and started.
    fn on_join(
        &mut self,
        _area_id: &AreaId,
        _player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }

    /// The player has been saved (or destroyed), released and removed.
    fn on_quit(
        &mut self,
        _area_id: &AreaId,
        _player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), AreaError>> + Send {
        async { Ok(()) }
    }
}

/// Logic with every hook left at its default.
///
/// For areas that only need the mechanics: `Area::new(NoHooks::<Visitor>::new(), ..)`.
pub struct NoHooks<P> {
    _player: PhantomData<fn() -> P>,
}

impl<P> NoHooks<P> {
    pub fn new() -> Self {
        Self {
            _player: PhantomData,
        }
    }
}

impl<P> Default for NoHooks<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Player> AreaLogic for NoHooks<P> {
    type Player = P;
}
