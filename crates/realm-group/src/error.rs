/// Errors a broadcast group service can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    /// The named group does not exist (never created, or destroyed).
    #[error("group {0} not found")]
    NotFound(String),

    /// The service could not be reached or timed out.
    #[error("group service unavailable: {0}")]
    Unavailable(String),
}
