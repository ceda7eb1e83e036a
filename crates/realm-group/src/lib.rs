//! Broadcast groups for Realm.
//!
//! A broadcast group is a named set of live connection endpoints. Each
//! running area owns one; players join it when they report a connection
//! and leave it when they disconnect. This crate provides the
//! [`BroadcastGroup`] trait and an in-process [`MemoryGroups`].
//!
//! # Feature Flags
//!
//! - `memory` (default): [`MemoryGroups`], delivering to Tokio channels

mod error;
#[cfg(feature = "memory")]
mod memory;

pub use error::GroupError;
#[cfg(feature = "memory")]
pub use memory::{Delivery, MemoryGroups};

use std::future::Future;

use realm_protocol::{ConnectionId, Message, PlayerId, Route};

/// Names a group created by [`BroadcastGroup::create_group`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupHandle {
    name: String,
}

impl GroupHandle {
    /// Wraps a group name. Services hand these out from `create_group`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The group's name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A publish/subscribe service organised in named groups.
///
/// Delivery is fire-and-forget: `Ok` means the service accepted the
/// message, not that any client read it.
pub trait BroadcastGroup: Send + Sync + 'static {
    /// Creates the group, or returns the existing one of that name.
    fn create_group(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<GroupHandle, GroupError>> + Send;

    /// Destroys the group and forgets its members.
    fn destroy_group(&self, name: &str) -> impl Future<Output = Result<(), GroupError>> + Send;

    /// Adds (or re-points) a player's connection in the group.
    fn add_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
        connection: ConnectionId,
    ) -> impl Future<Output = Result<(), GroupError>> + Send;

    /// Removes a player from the group. Removing a non-member is a no-op.
    fn remove_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
    ) -> impl Future<Output = Result<(), GroupError>> + Send;

    /// The connection a player is reachable on, if it is a member.
    fn lookup_member(
        &self,
        group: &GroupHandle,
        player_id: &PlayerId,
    ) -> impl Future<Output = Result<Option<ConnectionId>, GroupError>> + Send;

    /// Pushes to every member of the group.
    fn push_to_group(
        &self,
        group: &GroupHandle,
        route: &Route,
        message: &Message,
    ) -> impl Future<Output = Result<(), GroupError>> + Send;

    /// Pushes to the listed connections only.
    fn push_to_members(
        &self,
        route: &Route,
        message: &Message,
        connections: &[ConnectionId],
    ) -> impl Future<Output = Result<(), GroupError>> + Send;
}
