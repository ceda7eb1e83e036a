//! Area configuration, init options and the lifecycle state machine.

use std::time::Duration;

use rand::Rng;
use realm_protocol::AreaId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AreaConfig
// ---------------------------------------------------------------------------

/// Host-level settings for an area.
///
/// Shared by every area a host runs; the per-area identity comes from
/// [`AreaOptions`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaConfig {
    /// Prefix of the broadcast group name. The group of area `A1` is
    /// `"{group_prefix}:A1"`.
    pub group_prefix: String,

    /// Bound of the actor's command channel. Senders wait when it fills.
    pub channel_size: usize,

    /// Period of the actor's background reconciliation while running.
    /// `None` disables it; reconciliation then only runs on request and
    /// as part of `serialize`.
    pub sync_interval: Option<Duration>,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            group_prefix: "area".to_string(),
            channel_size: 64,
            sync_interval: None,
        }
    }
}

impl AreaConfig {
    /// Fixes out-of-range values so the config is safe to use.
    ///
    /// - An empty `group_prefix` falls back to the default.
    /// - `channel_size` is at least 1.
    /// - A zero `sync_interval` disables periodic reconciliation.
    pub fn validated(mut self) -> Self {
        if self.group_prefix.trim().is_empty() {
            tracing::warn!("empty group_prefix, using default");
            self.group_prefix = Self::default().group_prefix;
        }
        if self.channel_size == 0 {
            tracing::warn!("channel_size 0 is not allowed, using 1");
            self.channel_size = 1;
        }
        if self.sync_interval == Some(Duration::ZERO) {
            self.sync_interval = None;
        }
        self
    }

    /// The broadcast group name for an area.
    pub fn group_name(&self, area_id: &AreaId) -> String {
        format!("{}:{}", self.group_prefix, area_id)
    }
}

// ---------------------------------------------------------------------------
// AreaOptions
// ---------------------------------------------------------------------------

/// Arguments to `init`.
#[derive(Debug, Clone, Default)]
pub struct AreaOptions {
    /// The identity to assign. A random one is generated when `None`.
    pub area_id: Option<AreaId>,
}

impl AreaOptions {
    /// Options that assign a specific identity.
    pub fn with_id(area_id: impl Into<AreaId>) -> Self {
        Self {
            area_id: Some(area_id.into()),
        }
    }

    pub(crate) fn into_area_id(self) -> AreaId {
        self.area_id.unwrap_or_else(generate_area_id)
    }
}

/// A random 32-character hex identity (128 bits).
fn generate_area_id() -> AreaId {
    let bytes: [u8; 16] = rand::rng().random();
    AreaId::new(bytes.iter().map(|b| format!("{b:02x}")).collect::<String>())
}

// ---------------------------------------------------------------------------
// AreaState
// ---------------------------------------------------------------------------

/// A lifecycle operation, as checked against [`AreaState::after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Init,
    Start,
    Stop,
    Serialize,
    Deserialize,
    Destroy,
}

impl Lifecycle {
    /// Lowercase operation name, as used in errors and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Serialize => "serialize",
            Self::Deserialize => "deserialize",
            Self::Destroy => "destroy",
        }
    }
}

/// The lifecycle state of an area.
///
/// ```text
/// Uninitialized ─init→ Initialized ─start→ Running ─stop→ Stopped ─destroy→ Destroyed
///                          │  ↺ deserialize       ↑           │  ↺ serialize
///                          │                      └───start───┘
/// ```
///
/// There is no in-flight state: an operation either completes and the
/// area is in the target state, or it fails and (unless the operation
/// says otherwise) the area is where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreaState {
    Uninitialized,
    Initialized,
    Running,
    Stopped,
    Destroyed,
}

impl AreaState {
    /// The state `op` leads to from here, or `None` if `op` isn't
    /// allowed in this state.
    pub fn after(self, op: Lifecycle) -> Option<Self> {
        match (self, op) {
            (Self::Uninitialized, Lifecycle::Init) => Some(Self::Initialized),
            (Self::Initialized | Self::Stopped, Lifecycle::Start) => Some(Self::Running),
            (Self::Running, Lifecycle::Stop) => Some(Self::Stopped),
            (Self::Stopped, Lifecycle::Serialize) => Some(Self::Stopped),
            (Self::Initialized, Lifecycle::Deserialize) => Some(Self::Initialized),
            (Self::Stopped, Lifecycle::Destroy) => Some(Self::Destroyed),
            _ => None,
        }
    }

    /// Returns `true` while the area serves players.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if players may join.
    pub fn accepts_join(self) -> bool {
        self.is_running()
    }

    /// Returns `true` if held players may be evicted normally.
    pub fn accepts_quit(self) -> bool {
        matches!(self, Self::Initialized | Self::Running | Self::Stopped)
    }
}

impl std::fmt::Display for AreaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "Uninitialized"),
            Self::Initialized => write!(f, "Initialized"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Destroyed => write!(f, "Destroyed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_area_state_after_follows_lifecycle_table() {
        use AreaState::*;
        assert_eq!(Uninitialized.after(Lifecycle::Init), Some(Initialized));
        assert_eq!(Initialized.after(Lifecycle::Start), Some(Running));
        assert_eq!(Stopped.after(Lifecycle::Start), Some(Running));
        assert_eq!(Running.after(Lifecycle::Stop), Some(Stopped));
        assert_eq!(Stopped.after(Lifecycle::Serialize), Some(Stopped));
        assert_eq!(Initialized.after(Lifecycle::Deserialize), Some(Initialized));
        assert_eq!(Stopped.after(Lifecycle::Destroy), Some(Destroyed));
    }

    #[test]
    fn test_area_state_after_rejects_unlisted_transitions() {
        use AreaState::*;
        assert_eq!(Initialized.after(Lifecycle::Init), None);
        assert_eq!(Running.after(Lifecycle::Serialize), None);
        assert_eq!(Running.after(Lifecycle::Destroy), None);
        assert_eq!(Stopped.after(Lifecycle::Deserialize), None);
        assert_eq!(Initialized.after(Lifecycle::Destroy), None);
        for op in [
            Lifecycle::Init,
            Lifecycle::Start,
            Lifecycle::Stop,
            Lifecycle::Serialize,
            Lifecycle::Deserialize,
            Lifecycle::Destroy,
        ] {
            assert_eq!(Destroyed.after(op), None, "{} from Destroyed", op.as_str());
        }
    }

    #[test]
    fn test_area_state_join_and_quit_windows() {
        assert!(AreaState::Running.accepts_join());
        assert!(!AreaState::Stopped.accepts_join());
        assert!(AreaState::Stopped.accepts_quit());
        assert!(AreaState::Initialized.accepts_quit());
        assert!(!AreaState::Uninitialized.accepts_quit());
        assert!(!AreaState::Destroyed.accepts_quit());
    }

    #[test]
    fn test_area_config_validated_fixes_out_of_range() {
        let config = AreaConfig {
            group_prefix: "  ".into(),
            channel_size: 0,
            sync_interval: Some(Duration::ZERO),
        }
        .validated();
        assert_eq!(config.group_prefix, "area");
        assert_eq!(config.channel_size, 1);
        assert_eq!(config.sync_interval, None);
    }

    #[test]
    fn test_area_config_group_name() {
        let config = AreaConfig::default();
        assert_eq!(config.group_name(&AreaId::new("A1")), "area:A1");
    }

    #[test]
    fn test_area_config_partial_deserialize_uses_defaults() {
        let config: AreaConfig = serde_json::from_str(r#"{"group_prefix":"zone"}"#).unwrap();
        assert_eq!(config.group_prefix, "zone");
        assert_eq!(config.channel_size, 64);
        assert_eq!(config.sync_interval, None);
    }

    #[test]
    fn test_area_options_generates_hex_identity() {
        let a = AreaOptions::default().into_area_id();
        let b = AreaOptions::default().into_area_id();
        assert_eq!(a.as_str().len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_area_options_with_id_keeps_identity() {
        assert_eq!(AreaOptions::with_id("A1").into_area_id(), AreaId::new("A1"));
    }
}
