//! Error types for the player layer.

use realm_protocol::PlayerId;

/// Errors a player reports from its own lifecycle calls.
///
/// The reason is a free-form string: the area never inspects it, it only
/// logs it or hands it back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlayerError {
    /// `start()` failed.
    #[error("player {0} failed to start: {1}")]
    Start(PlayerId, String),

    /// `stop()` failed.
    #[error("player {0} failed to stop: {1}")]
    Stop(PlayerId, String),

    /// `destroy()` failed; the player's persistent state may still exist.
    #[error("player {0} could not be destroyed: {1}")]
    Destroy(PlayerId, String),
}

impl PlayerError {
    /// The player that reported the failure.
    pub fn player_id(&self) -> &PlayerId {
        match self {
            Self::Start(id, _) | Self::Stop(id, _) | Self::Destroy(id, _) => id,
        }
    }
}
