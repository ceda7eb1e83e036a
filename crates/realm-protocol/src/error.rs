//! Error types for the protocol layer.
//!
//! Each crate in Realm defines its own error enum. A `ProtocolError`
//! always means a value could not be turned into bytes or back, never
//! that a backend or an area misbehaved.

/// Errors that can occur while encoding or decoding protocol values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Common causes: a truncated record, or a record written by a
    /// different version of the player type.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
}
