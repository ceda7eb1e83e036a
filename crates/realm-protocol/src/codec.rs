//! Codec trait and implementations for storing protocol values as bytes.
//!
//! Backends that keep records outside the process (a snapshot store, a
//! lock table) need bytes, not Rust values. The [`Codec`] trait is the
//! seam: backends are written against it and the concrete format is
//! swapped without touching them.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust values to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because a codec lives inside backend clients
/// that are shared by every area on a host.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if the value can't be represented
    /// in this format.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Snapshots are small and read far less often than they are written, so
/// readability of the stored record wins over size here.
///
/// ## Example
///
/// ```rust
/// use realm_protocol::{Codec, JsonCodec, PlayerId, PlayerSnapshot};
///
/// let codec = JsonCodec;
/// let snapshot = PlayerSnapshot::empty(PlayerId::new("p1"));
///
/// let bytes = codec.encode(&snapshot).unwrap();
/// let decoded: PlayerSnapshot = codec.decode(&bytes).unwrap();
/// assert_eq!(snapshot, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
