//! Typed event emission with token-based subscription.
//!
//! A player emits three kinds of events. Whoever holds the player (an
//! area) registers an async listener per kind and gets a
//! [`SubscriptionToken`] back; presenting the token is the only way to
//! remove the listener again.
//!
//! ```text
//!   subscribe(kind, f) ──→ token
//!   emit(event)        ──→ awaits every listener for event.kind()
//!   unsubscribe(token) ──→ true once, false afterwards
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use realm_protocol::{ConnectionId, Message, NotifyTarget, Route};

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// The kinds of event a player can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The player's client attached a connection.
    Connect,
    /// The player's client went away.
    Disconnect,
    /// The player asks its area to push a message.
    NotifyRequest,
}

impl EventKind {
    /// Every kind, in the order an area wires them.
    pub const ALL: [EventKind; 3] = [Self::Connect, Self::Disconnect, Self::NotifyRequest];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect"),
            Self::Disconnect => write!(f, "disconnect"),
            Self::NotifyRequest => write!(f, "notify-request"),
        }
    }
}

/// An event emitted by a player.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A connection endpoint is now live for this player.
    Connect(ConnectionId),

    /// The player's connection is gone.
    Disconnect,

    /// Push `message` on `route` to `target` through the area.
    NotifyRequest {
        target: NotifyTarget,
        route: Route,
        message: Message,
    },
}

impl PlayerEvent {
    /// Which kind of listener receives this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connect(_) => EventKind::Connect,
            Self::Disconnect => EventKind::Disconnect,
            Self::NotifyRequest { .. } => EventKind::NotifyRequest,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Proof of a registered listener. Hand it back to
/// [`PlayerEvents::unsubscribe`] to remove exactly that listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    kind: EventKind,
    id: u64,
}

impl SubscriptionToken {
    /// The event kind this token listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// A type-erased async event listener.
pub type Listener = Arc<dyn Fn(PlayerEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// The event emitter embedded in every player.
///
/// Listeners run in subscription order and `emit` returns only after all
/// of them have completed, so an emitting player observes the effect of
/// its event (e.g. group membership after `connect`).
pub struct PlayerEvents {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionToken, Listener)>>,
}

impl PlayerEvents {
    /// Creates an emitter with no listeners.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Registers `listener` for events of `kind`.
    pub fn subscribe<F, Fut>(&self, kind: EventKind, listener: F) -> SubscriptionToken
    where
        F: Fn(PlayerEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = SubscriptionToken {
            kind,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        let listener: Listener = Arc::new(move |event| listener(event).boxed());
        self.write().push((token, listener));
        token
    }

    /// Removes the listener registered under `token`.
    ///
    /// Returns `false` if the token is unknown (never issued here, or
    /// already removed).
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        let mut listeners = self.write();
        let before = listeners.len();
        listeners.retain(|(t, _)| *t != token);
        listeners.len() != before
    }

    /// Delivers `event` to every listener of its kind.
    ///
    /// Returns how many listeners were invoked.
    pub async fn emit(&self, event: PlayerEvent) -> usize {
        let kind = event.kind();
        let targets: Vec<Listener> = self
            .read()
            .iter()
            .filter(|(token, _)| token.kind == kind)
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        if targets.is_empty() {
            tracing::trace!(%kind, "event emitted with no listeners");
        }

        for listener in &targets {
            listener(event.clone()).await;
        }
        targets.len()
    }

    /// Number of listeners currently registered for `kind`.
    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.read().iter().filter(|(token, _)| token.kind == kind).count()
    }

    // A listener panicking mid-registration leaves the vector intact, so
    // a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Vec<(SubscriptionToken, Listener)>> {
        self.listeners.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<(SubscriptionToken, Listener)>> {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PlayerEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PlayerEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerEvents")
            .field("listeners", &self.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &'static str| -> Listener {
                let log = Arc::clone(&log);
                Arc::new(move |event: PlayerEvent| {
                    let log = Arc::clone(&log);
                    async move {
                        log.lock().unwrap().push(format!("{tag}:{}", event.kind()));
                    }
                    .boxed()
                })
            }
        };
        (log, make)
    }

    #[tokio::test]
    async fn test_emit_reaches_only_listeners_of_that_kind() {
        let events = PlayerEvents::new();
        let (log, make) = recorder();
        let on_connect = make("a");
        let on_disconnect = make("b");
        events.subscribe(EventKind::Connect, move |e| on_connect(e));
        events.subscribe(EventKind::Disconnect, move |e| on_disconnect(e));

        let delivered = events.emit(PlayerEvent::Connect(ConnectionId::new(1))).await;

        assert_eq!(delivered, 1);
        assert_eq!(*log.lock().unwrap(), vec!["a:connect".to_string()]);
    }

    #[tokio::test]
    async fn test_emit_runs_listeners_in_subscription_order() {
        let events = PlayerEvents::new();
        let (log, make) = recorder();
        for tag in ["first", "second", "third"] {
            let listener = make(tag);
            events.subscribe(EventKind::Disconnect, move |e| listener(e));
        }

        events.emit(PlayerEvent::Disconnect).await;

        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:disconnect", "second:disconnect", "third:disconnect"]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_returns_false_second_time() {
        let events = PlayerEvents::new();
        let token = events.subscribe(EventKind::NotifyRequest, |_| async {});

        assert!(events.unsubscribe(token));
        assert!(!events.unsubscribe(token));
        assert_eq!(events.listener_count(EventKind::NotifyRequest), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_only_that_listener() {
        let events = PlayerEvents::new();
        let (log, make) = recorder();
        let keep = make("keep");
        let drop_me = make("drop");
        events.subscribe(EventKind::Connect, move |e| keep(e));
        let token = events.subscribe(EventKind::Connect, move |e| drop_me(e));

        events.unsubscribe(token);
        events.emit(PlayerEvent::Connect(ConnectionId::new(3))).await;

        assert_eq!(*log.lock().unwrap(), vec!["keep:connect".to_string()]);
    }

    #[tokio::test]
    async fn test_emit_without_listeners_returns_zero() {
        let events = PlayerEvents::new();
        let delivered = events
            .emit(PlayerEvent::NotifyRequest {
                target: NotifyTarget::All,
                route: Route::new("chat"),
                message: json!({ "text": "hi" }),
            })
            .await;
        assert_eq!(delivered, 0);
    }

    #[test]
    fn test_tokens_are_unique_per_subscription() {
        let events = PlayerEvents::new();
        let a = events.subscribe(EventKind::Connect, |_| async {});
        let b = events.subscribe(EventKind::Connect, |_| async {});
        assert_ne!(a, b);
        assert_eq!(a.kind(), EventKind::Connect);
    }

    #[test]
    fn test_event_kind_display() {
        assert_eq!(EventKind::NotifyRequest.to_string(), "notify-request");
    }
}
