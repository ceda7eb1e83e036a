//! Core protocol types shared by areas, players and backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque, immutable identity of an area.
///
/// Assigned once at `init` and fixed for the area's lifetime. It is also
/// the scope of every ownership lock the area takes in the ledger.
///
/// `#[serde(transparent)]` stores it as a plain string, not `{"0": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AreaId(String);

impl AreaId {
    /// Creates an `AreaId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AreaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A unique identifier for a player.
///
/// Same newtype pattern as [`AreaId`]: you can't pass an area id where a
/// player id is expected even though both are strings underneath.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    /// Creates a `PlayerId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifies one live connection endpoint of a player.
///
/// Handed out by whatever owns the sockets; a broadcast group maps
/// player ids to these when it delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Notification payloads
// ---------------------------------------------------------------------------

/// The client-side handler a pushed message is addressed to
/// (e.g. `"chat"`, `"onMove"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    /// Creates a route from anything string-like.
    pub fn new(route: impl Into<String>) -> Self {
        Self(route.into())
    }

    /// Returns the route as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Route {
    fn from(route: &str) -> Self {
        Self::new(route)
    }
}

/// A pushed message body. Opaque to the area; only clients interpret it.
pub type Message = Value;

/// Who should receive a notification.
///
/// ```text
/// All                → every member of the area's broadcast group
/// Player(p)          → just p's connection
/// Players([p, q])    → p's and q's connections
/// Players([])        → same as All
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotifyTarget {
    /// Broadcast to the whole group.
    #[default]
    All,

    /// One specific player.
    Player(PlayerId),

    /// A set of players. An empty list broadcasts.
    Players(Vec<PlayerId>),
}

impl NotifyTarget {
    /// Resolves the target to an explicit player list, or `None` when the
    /// message should go to the whole group.
    ///
    /// A single id is treated as a one-element collection.
    pub fn into_players(self) -> Option<Vec<PlayerId>> {
        match self {
            Self::All => None,
            Self::Player(id) => Some(vec![id]),
            Self::Players(ids) if ids.is_empty() => None,
            Self::Players(ids) => Some(ids),
        }
    }

    /// Returns `true` if this target reaches the whole group.
    pub fn is_broadcast(&self) -> bool {
        match self {
            Self::All => true,
            Self::Player(_) => false,
            Self::Players(ids) => ids.is_empty(),
        }
    }
}

impl From<PlayerId> for NotifyTarget {
    fn from(id: PlayerId) -> Self {
        Self::Player(id)
    }
}

impl From<Vec<PlayerId>> for NotifyTarget {
    fn from(ids: Vec<PlayerId>) -> Self {
        Self::Players(ids)
    }
}

impl From<Option<PlayerId>> for NotifyTarget {
    fn from(id: Option<PlayerId>) -> Self {
        id.map_or(Self::All, Self::Player)
    }
}

// ---------------------------------------------------------------------------
// Persistence shapes
// ---------------------------------------------------------------------------

/// The persisted state of one player, as stored by the ownership ledger.
///
/// `data` belongs to the player type; the area and the ledger only move
/// it around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Which player this snapshot belongs to.
    pub player_id: PlayerId,

    /// Player-defined state.
    #[serde(default)]
    pub data: Value,
}

impl PlayerSnapshot {
    /// Creates a snapshot carrying the given data.
    pub fn new(player_id: PlayerId, data: Value) -> Self {
        Self { player_id, data }
    }

    /// A snapshot for a player that has never been saved.
    pub fn empty(player_id: PlayerId) -> Self {
        Self {
            player_id,
            data: Value::Object(Map::new()),
        }
    }
}

/// The area-level record written by `serialize` and read by `deserialize`.
///
/// Player state is not in here; it lives in the ledger. The document
/// carries the area's identity plus whatever area-level fields the
/// serialize hook attaches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AreaDocument {
    /// The area this document was written by. Filled by `serialize`.
    #[serde(default)]
    pub area_id: Option<AreaId>,

    /// Area-level fields attached by hooks.
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl AreaDocument {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an area-level field, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Reads an area-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    // =====================================================================
    // Identity types
    // =====================================================================

    #[test]
    fn test_player_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PlayerId::new("p1")).unwrap();
        assert_eq!(json, "\"p1\"");
    }

    #[test]
    fn test_area_id_display_is_raw_id() {
        assert_eq!(AreaId::new("A1").to_string(), "A1");
    }

    #[test]
    fn test_connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }

    // =====================================================================
    // NotifyTarget
    // =====================================================================

    #[test]
    fn test_notify_target_single_player_is_one_element_list() {
        let target = NotifyTarget::from(PlayerId::new("p1"));
        assert!(!target.is_broadcast());
        assert_eq!(target.into_players(), Some(vec![PlayerId::new("p1")]));
    }

    #[test]
    fn test_notify_target_empty_list_broadcasts() {
        let target = NotifyTarget::from(Vec::<PlayerId>::new());
        assert!(target.is_broadcast());
        assert_eq!(target.into_players(), None);
    }

    #[test]
    fn test_notify_target_none_broadcasts() {
        let target = NotifyTarget::from(None::<PlayerId>);
        assert_eq!(target, NotifyTarget::All);
    }

    // =====================================================================
    // Persistence shapes
    // =====================================================================

    #[test]
    fn test_player_snapshot_missing_data_defaults_to_null() {
        let snapshot: PlayerSnapshot =
            serde_json::from_str(r#"{"player_id":"p9"}"#).unwrap();
        assert_eq!(snapshot.player_id, PlayerId::new("p9"));
        assert!(snapshot.data.is_null());
    }

    #[test]
    fn test_area_document_set_replaces_field() {
        let mut doc = AreaDocument::new();
        doc.set("weather", json!("rain"));
        doc.set("weather", json!("sun"));
        assert_eq!(doc.get("weather"), Some(&json!("sun")));
        assert_eq!(doc.fields.len(), 1);
    }

    #[test]
    fn test_area_document_shape_on_the_wire() {
        let mut doc = AreaDocument::new();
        doc.area_id = Some(AreaId::new("A1"));
        doc.set("round", json!(3));
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value, json!({ "area_id": "A1", "fields": { "round": 3 } }));
    }
}
