//! Player event wiring and notify routing.
//!
//! While an area runs, each held player has exactly one listener per
//! [`EventKind`]. Those listeners translate player events into broadcast
//! group calls:
//!
//! | Event            | Effect                                        |
//! |------------------|-----------------------------------------------|
//! | `connect(c)`     | `add_member(group, player, c)`                |
//! | `disconnect`     | `remove_member(group, player)`                |
//! | `notify-request` | same routing as [`Area::notify`]              |
//!
//! [`Area::notify`]: crate::Area::notify

use std::collections::HashMap;
use std::sync::Arc;

use realm_group::{BroadcastGroup, GroupHandle};
use realm_player::{EventKind, Player, PlayerEvent, SubscriptionToken};
use realm_protocol::{ConnectionId, Message, NotifyTarget, PlayerId, Route};

use crate::AreaError;

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Routes messages through one area's broadcast group.
pub(crate) struct Notifier<B> {
    groups: Arc<B>,
    group: GroupHandle,
}

impl<B> Clone for Notifier<B> {
    fn clone(&self) -> Self {
        Self {
            groups: Arc::clone(&self.groups),
            group: self.group.clone(),
        }
    }
}

impl<B: BroadcastGroup> Notifier<B> {
    pub(crate) fn new(groups: Arc<B>, group: GroupHandle) -> Self {
        Self { groups, group }
    }

    /// Pushes to the whole group, or to the listed players' connections.
    ///
    /// Listed players that aren't group members (never connected, or
    /// already gone) are skipped. If none of them resolve, nothing is
    /// pushed.
    pub(crate) async fn notify(
        &self,
        target: NotifyTarget,
        route: &Route,
        message: &Message,
    ) -> Result<(), AreaError> {
        let Some(players) = target.into_players() else {
            self.groups.push_to_group(&self.group, route, message).await?;
            return Ok(());
        };

        let mut connections: Vec<ConnectionId> = Vec::with_capacity(players.len());
        for player_id in &players {
            match self.groups.lookup_member(&self.group, player_id).await? {
                Some(connection) => connections.push(connection),
                None => tracing::debug!(%player_id, %route, "notify target not connected, skipping"),
            }
        }
        if connections.is_empty() {
            return Ok(());
        }
        self.groups.push_to_members(route, message, &connections).await?;
        Ok(())
    }

    /// Reacts to one player event. Failures are logged; the emitting
    /// player never sees them.
    async fn on_player_event(self, player_id: PlayerId, event: PlayerEvent) {
        let kind = event.kind();
        let result = match event {
            PlayerEvent::Connect(connection) => self
                .groups
                .add_member(&self.group, &player_id, connection)
                .await
                .map_err(AreaError::from),
            PlayerEvent::Disconnect => self
                .groups
                .remove_member(&self.group, &player_id)
                .await
                .map_err(AreaError::from),
            PlayerEvent::NotifyRequest {
                target,
                route,
                message,
            } => self.notify(target, &route, &message).await,
        };

        match result {
            Ok(()) => tracing::debug!(%player_id, %kind, group = self.group.name(), "player event handled"),
            Err(e) => tracing::warn!(%player_id, %kind, group = self.group.name(), error = %e, "player event failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriptions
// ---------------------------------------------------------------------------

/// The area's record of which listeners it registered on which player.
#[derive(Debug, Default)]
pub(crate) struct Subscriptions {
    by_player: HashMap<PlayerId, HashMap<EventKind, SubscriptionToken>>,
}

impl Subscriptions {
    /// Registers one listener per event kind on `player`.
    ///
    /// Kinds already wired for this player are skipped, so calling this
    /// twice never doubles the listeners.
    pub(crate) fn wire<P, B>(&mut self, player: &P, notifier: &Notifier<B>)
    where
        P: Player,
        B: BroadcastGroup,
    {
        let player_id = player.id().clone();
        let tokens = self.by_player.entry(player_id.clone()).or_default();

        for kind in EventKind::ALL {
            if tokens.contains_key(&kind) {
                tracing::debug!(%player_id, %kind, "listener already registered, skipping");
                continue;
            }
            let notifier = notifier.clone();
            let listener_player = player_id.clone();
            let token = player.events().subscribe(kind, move |event| {
                notifier.clone().on_player_event(listener_player.clone(), event)
            });
            tokens.insert(kind, token);
        }
    }

    /// Removes every listener this area registered on `player`.
    pub(crate) fn unwire<P: Player>(&mut self, player: &P) {
        let Some(tokens) = self.by_player.remove(player.id()) else {
            return;
        };
        for token in tokens.into_values() {
            if !player.events().unsubscribe(token) {
                tracing::debug!(player_id = %player.id(), kind = %token.kind(), "listener already gone");
            }
        }
    }

    /// Returns `true` if any listener is registered for the player.
    pub(crate) fn is_wired(&self, player_id: &PlayerId) -> bool {
        self.by_player.get(player_id).is_some_and(|tokens| !tokens.is_empty())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_player.is_empty()
    }
}
