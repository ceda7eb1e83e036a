//! Error types for the ledger layer.

use realm_protocol::{AreaId, PlayerId, ProtocolError};

/// Errors an ownership ledger can report.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Another area holds the player's ownership lock.
    ///
    /// This is a normal outcome, not a fault: two areas racing for the
    /// same player is exactly what the lock exists for.
    #[error("player {player_id} is owned by area {owner}")]
    AlreadyOwned { player_id: PlayerId, owner: AreaId },

    /// No record exists for the player.
    #[error("no record for player {0}")]
    NotFound(PlayerId),

    /// The backend could not be reached or timed out.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] ProtocolError),
}
