//! Error types for audit-log lookups.

/// Errors returned by an [`AuditLogSource`](crate::correlator::AuditLogSource).
///
/// None of these are fatal: the correlator logs them and reports the event
/// as unattributed.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Network or connection failure.
    #[error("audit log request failed: {0}")]
    Transport(String),

    /// The bot lacks the permission to read the guild's audit log.
    #[error("missing permission to read the audit log")]
    Forbidden,

    /// Any other non-success response.
    #[error("audit log returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("audit log response could not be decoded: {0}")]
    Decode(String),
}
