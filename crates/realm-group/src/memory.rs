//! In-process broadcast groups.
//!
//! Every connection is an unbounded channel; the receiving half goes to
//! whoever drives the client (a socket writer, a test). Messages for a
//! connection whose receiver is gone are dropped silently, the same way a
//! departed client would never read them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use realm_protocol::{ConnectionId, Message, PlayerId, Route};
use tokio::sync::{Mutex, mpsc};

use crate::{BroadcastGroup, GroupError, GroupHandle};

/// A message as received by one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub route: Route,
    pub message: Message,
}

#[derive(Debug, Default)]
struct GroupsState {
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Delivery>>,
    groups: HashMap<String, HashMap<PlayerId, ConnectionId>>,
    unavailable: bool,
}

impl GroupsState {
    fn check_available(&self) -> Result<(), GroupError> {
        if self.unavailable {
            return Err(GroupError::Unavailable("memory groups offline".into()));
        }
        Ok(())
    }

    fn group_mut(
        &mut self,
        group: &GroupHandle,
    ) -> Result<&mut HashMap<PlayerId, ConnectionId>, GroupError> {
        self.groups
            .get_mut(group.name())
            .ok_or_else(|| GroupError::NotFound(group.name().to_string()))
    }

    fn deliver(&self, connection: ConnectionId, delivery: Delivery) {
        if let Some(sender) = self.connections.get(&connection) {
            let _ = sender.send(delivery);
        }
    }
}

/// A [`BroadcastGroup`] service kept in memory.
#[derive(Debug)]
pub struct MemoryGroups {
    next_connection: AtomicU64,
    state: Mutex<GroupsState>,
}

impl MemoryGroups {
    /// Creates a service with no groups and no connections.
    pub fn new() -> Self {
        Self {
            next_connection: AtomicU64::new(1),
            state: Mutex::new(GroupsState::default()),
        }
    }

    /// Opens a connection endpoint. Pass the id to a player's `connect`;
    /// read what the group pushes from the receiver.
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Delivery>) {
        let id = ConnectionId::new(self.next_connection.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().await.connections.insert(id, tx);
        (id, rx)
    }

    /// Returns `true` if a group of that name exists.
    pub async fn group_exists(&self, name: &str) -> bool {
        self.state.lock().await.groups.contains_key(name)
    }

    /// Current members of a group, or `None` if it doesn't exist.
    pub async fn members(&self, name: &str) -> Option<HashMap<PlayerId, ConnectionId>> {
        self.state.lock().await.groups.get(name).cloned()
    }

    /// Makes every operation fail with [`GroupError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }
}

impl Default for MemoryGroups {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastGroup for MemoryGroups {
    async fn create_group(&self, name: &str) -> Result<GroupHandle, GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        state.groups.entry(name.to_string()).or_default();
        tracing::debug!(group = name, "group created");
        Ok(GroupHandle::new(name))
    }

    async fn destroy_group(&self, name: &str) -> Result<(), GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        if state.groups.remove(name).is_some() {
            tracing::debug!(group = name, "group destroyed");
        }
        Ok(())
    }

    async fn add_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        state.group_mut(group)?.insert(player_id.clone(), connection);
        Ok(())
    }

    async fn remove_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        state.group_mut(group)?.remove(player_id);
        Ok(())
    }

    async fn lookup_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
    ) -> Result<Option<ConnectionId>, GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        Ok(state.group_mut(group)?.get(player_id).copied())
    }

    async fn push_to_group(
        &self,
        group: &GroupHandle,
        route: &Route,
        message: &Message,
    ) -> Result<(), GroupError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        let connections: Vec<ConnectionId> = state.group_mut(group)?.values().copied().collect();
        for connection in connections {
            state.deliver(
                connection,
                Delivery {
                    route: route.clone(),
                    message: message.clone(),
                },
            );
        }
        Ok(())
    }

    async fn push_to_members(
        &self,
        route: &Route,
        message: &Message,
        connections: &[ConnectionId],
    ) -> Result<(), GroupError> {
        let state = self.state.lock().await;
        state.check_available()?;
        for connection in connections {
            state.deliver(
                *connection,
                Delivery {
                    route: route.clone(),
                    message: message.clone(),
                },
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn pid(id: &str) -> PlayerId {
        PlayerId::new(id)
    }

    #[tokio::test]
    async fn test_push_to_group_reaches_every_member() {
        let groups = MemoryGroups::new();
        let group = groups.create_group("area:A1").await.unwrap();
        let (c1, mut rx1) = groups.connect().await;
        let (c2, mut rx2) = groups.connect().await;
        groups.add_member(&group, &pid("p1"), c1).await.unwrap();
        groups.add_member(&group, &pid("p2"), c2).await.unwrap();

        groups
            .push_to_group(&group, &Route::new("chat"), &json!("hello"))
            .await
            .unwrap();

        assert_eq!(rx1.try_recv().unwrap().message, json!("hello"));
        assert_eq!(rx2.try_recv().unwrap().route, Route::new("chat"));
    }

    #[tokio::test]
    async fn test_push_to_members_skips_unlisted_connections() {
        let groups = MemoryGroups::new();
        let (c1, mut rx1) = groups.connect().await;
        let (_c2, mut rx2) = groups.connect().await;

        groups
            .push_to_members(&Route::new("chat"), &json!(1), &[c1])
            .await
            .unwrap();

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_remove_member_then_lookup_returns_none() {
        let groups = MemoryGroups::new();
        let group = groups.create_group("g").await.unwrap();
        let (c1, _rx) = groups.connect().await;
        groups.add_member(&group, &pid("p1"), c1).await.unwrap();

        groups.remove_member(&group, &pid("p1")).await.unwrap();

        assert_eq!(groups.lookup_member(&group, &pid("p1")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_member_to_destroyed_group_returns_not_found() {
        let groups = MemoryGroups::new();
        let group = groups.create_group("g").await.unwrap();
        groups.destroy_group("g").await.unwrap();
        let (c1, _rx) = groups.connect().await;

        let result = groups.add_member(&group, &pid("p1"), c1).await;

        assert_eq!(result, Err(GroupError::NotFound("g".into())));
        assert!(!groups.group_exists("g").await);
    }

    #[tokio::test]
    async fn test_create_group_twice_keeps_members() {
        let groups = MemoryGroups::new();
        let group = groups.create_group("g").await.unwrap();
        let (c1, _rx) = groups.connect().await;
        groups.add_member(&group, &pid("p1"), c1).await.unwrap();

        groups.create_group("g").await.unwrap();

        assert_eq!(groups.members("g").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_push_to_dropped_connection_is_silent() {
        let groups = MemoryGroups::new();
        let group = groups.create_group("g").await.unwrap();
        let (c1, rx) = groups.connect().await;
        groups.add_member(&group, &pid("p1"), c1).await.unwrap();
        drop(rx);

        let result = groups.push_to_group(&group, &Route::new("x"), &json!(null)).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_rejects_operations() {
        let groups = MemoryGroups::new();
        groups.set_unavailable(true).await;
        let result = groups.create_group("g").await;
        assert!(matches!(result, Err(GroupError::Unavailable(_))));
    }
}
