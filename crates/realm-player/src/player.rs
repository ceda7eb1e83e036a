//! The `Player` trait: what an area needs from the entities it holds.

use std::future::Future;

use realm_protocol::{ConnectionId, Message, NotifyTarget, PlayerId, PlayerSnapshot, Route};

use crate::{PlayerError, PlayerEvent, PlayerEvents};

/// An owned, stateful sub-entity of an area.
///
/// An area builds players from ledger snapshots, starts them when it
/// starts serving, stops them when it stops, and either saves or destroys
/// them on eviction. The player itself decides what `start`/`stop` mean.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → a player lives inside an area that may be
///   moved into its own Tokio task.
/// - Lifecycle methods return `Send` futures for the same reason, while
///   implementors can still write plain `async fn`.
///
/// # Example
///
/// ```rust
/// use realm_player::{Player, PlayerEvents};
/// use realm_protocol::{PlayerId, PlayerSnapshot};
///
/// struct Visitor {
///     id: PlayerId,
///     events: PlayerEvents,
/// }
///
/// impl Player for Visitor {
///     fn from_snapshot(snapshot: PlayerSnapshot) -> Self {
///         Self { id: snapshot.player_id, events: PlayerEvents::new() }
///     }
///
///     fn id(&self) -> &PlayerId {
///         &self.id
///     }
///
///     fn snapshot(&self) -> PlayerSnapshot {
///         PlayerSnapshot::empty(self.id.clone())
///     }
///
///     fn events(&self) -> &PlayerEvents {
///         &self.events
///     }
/// }
/// ```
pub trait Player: Send + Sync + 'static {
    /// Rebuilds a player from its persisted state.
    fn from_snapshot(snapshot: PlayerSnapshot) -> Self
    where
        Self: Sized;

    /// The player's identity.
    fn id(&self) -> &PlayerId;

    /// Captures the player's current state for persistence.
    fn snapshot(&self) -> PlayerSnapshot;

    /// The emitter the area subscribes to.
    fn events(&self) -> &PlayerEvents;

    /// Begins serving. Default: nothing to do.
    fn start(&self) -> impl Future<Output = Result<(), PlayerError>> + Send {
        async { Ok(()) }
    }

    /// Stops serving. Called on area stop and on eviction; should
    /// tolerate being called on an already-stopped player. Default:
    /// nothing to do.
    fn stop(&self) -> impl Future<Output = Result<(), PlayerError>> + Send {
        async { Ok(()) }
    }

    /// Permanently deletes the player (eviction with `remove`).
    /// Default: nothing to delete.
    fn destroy(&self) -> impl Future<Output = Result<(), PlayerError>> + Send {
        async { Ok(()) }
    }

    /// Reports a live connection. Returns how many listeners saw it.
    fn connect(&self, connection: ConnectionId) -> impl Future<Output = usize> + Send {
        self.events().emit(PlayerEvent::Connect(connection))
    }

    /// Reports that the connection went away.
    fn disconnect(&self) -> impl Future<Output = usize> + Send {
        self.events().emit(PlayerEvent::Disconnect)
    }

    /// Asks the holding area to push `message` on `route` to `target`.
    fn request_notify(
        &self,
        target: NotifyTarget,
        route: Route,
        message: Message,
    ) -> impl Future<Output = usize> + Send {
        self.events().emit(PlayerEvent::NotifyRequest {
            target,
            route,
            message,
        })
    }
}
