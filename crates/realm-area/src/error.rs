//! Error types for the area layer.

use realm_group::GroupError;
use realm_ledger::LedgerError;
use realm_player::PlayerError;
use realm_protocol::{AreaId, PlayerId};

use crate::AreaState;

/// Errors that can occur during area operations.
///
/// Hosts are expected to retry [`LockConflict`](Self::LockConflict) and
/// [`Unavailable`](Self::Unavailable) on `join`.
/// [`PreconditionFailed`](Self::PreconditionFailed) from `destroy` is a
/// caller bug: evict the players first.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AreaError {
    /// The player's ownership lock is held by another area.
    #[error("player {player_id} is owned by area {owner}")]
    LockConflict { player_id: PlayerId, owner: AreaId },

    /// The player or its snapshot doesn't exist in the ledger.
    #[error("player {0} not found")]
    NotFound(PlayerId),

    /// A backend call failed or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// The operation's precondition doesn't hold: destroying a non-empty
    /// area, joining a player already held, or a hook vetoing the
    /// operation.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The player is not held by this area.
    #[error("player {0} not present in area")]
    NotPresent(PlayerId),

    /// The area's lifecycle state doesn't allow this operation.
    #[error("cannot {operation} area in state {state}")]
    InvalidState {
        operation: &'static str,
        state: AreaState,
    },

    /// A player's own lifecycle call failed.
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// The broadcast group service rejected a call.
    #[error(transparent)]
    Group(#[from] GroupError),
}

impl From<LedgerError> for AreaError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AlreadyOwned { player_id, owner } => Self::LockConflict { player_id, owner },
            LedgerError::NotFound(player_id) => Self::NotFound(player_id),
            LedgerError::Unavailable(reason) => Self::Unavailable(reason),
            LedgerError::Codec(e) => Self::Unavailable(format!("unreadable ledger record: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ledger_already_owned_is_lock_conflict() {
        let err: AreaError = LedgerError::AlreadyOwned {
            player_id: PlayerId::new("p1"),
            owner: AreaId::new("A2"),
        }
        .into();
        assert!(matches!(err, AreaError::LockConflict { owner, .. } if owner == AreaId::new("A2")));
    }

    #[test]
    fn test_from_ledger_not_found_keeps_player() {
        let err: AreaError = LedgerError::NotFound(PlayerId::new("p7")).into();
        assert!(matches!(err, AreaError::NotFound(p) if p == PlayerId::new("p7")));
    }

    #[test]
    fn test_from_ledger_unavailable_keeps_reason() {
        let err: AreaError = LedgerError::Unavailable("timeout".into()).into();
        assert_eq!(err.to_string(), "backend unavailable: timeout");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = AreaError::InvalidState {
            operation: "start",
            state: AreaState::Destroyed,
        };
        assert_eq!(err.to_string(), "cannot start area in state Destroyed");
    }
}
