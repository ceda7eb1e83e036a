//! Unified error type for Realm.

use realm_area::AreaError;
use realm_group::GroupError;
use realm_ledger::LedgerError;
use realm_player::PlayerError;
use realm_protocol::{AreaId, ProtocolError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `realm` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RealmError {
    /// Encoding or decoding a record failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A player's lifecycle call failed.
    #[error(transparent)]
    Player(#[from] PlayerError),

    /// The ownership ledger rejected a call.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The broadcast group service rejected a call.
    #[error(transparent)]
    Group(#[from] GroupError),

    /// An area operation failed.
    #[error(transparent)]
    Area(#[from] AreaError),

    /// No area with this id is open on the host.
    #[error("area {0} is not open")]
    AreaNotOpen(AreaId),
}
