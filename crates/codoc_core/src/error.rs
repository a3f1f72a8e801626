//! crates/codoc_core/src/error.rs
//!
//! The error taxonomy returned by every core operation. The web layer maps
//! these onto transport responses; nothing here knows about HTTP.

use crate::ports::PortError;

/// The kinds of state conflicts a request can run into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    AlreadyShared,
    SelfShare,
    EmailTaken,
    AlreadyVerified,
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            ConflictKind::AlreadyShared => "PDF already shared with this user",
            ConflictKind::SelfShare => "You cannot share with yourself",
            ConflictKind::EmailTaken => "User already exists",
            ConflictKind::AlreadyVerified => "Account already verified",
        };
        f.write_str(message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("You do not have access to this resource")]
    Forbidden,
    #[error("Please login to continue")]
    Unauthenticated,
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(ConflictKind),
    #[error("OTP has expired. Please request a new one")]
    Expired,
    #[error("Invalid OTP")]
    Mismatch,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }
}

impl From<PortError> for CoreError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CoreError::NotFound(what),
            PortError::Unauthorized => CoreError::Unauthenticated,
            PortError::Conflict(what) => CoreError::Internal(format!("unexpected conflict: {what}")),
            PortError::Unexpected(what) => CoreError::Internal(what),
        }
    }
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_onto_the_taxonomy() {
        assert!(matches!(
            CoreError::from(PortError::NotFound("PDF not found".into())),
            CoreError::NotFound(m) if m == "PDF not found"
        ));
        assert!(matches!(
            CoreError::from(PortError::Unauthorized),
            CoreError::Unauthenticated
        ));
        assert!(matches!(
            CoreError::from(PortError::Unexpected("pool timed out".into())),
            CoreError::Internal(_)
        ));
    }

    #[test]
    fn conflicts_render_user_facing_messages() {
        assert_eq!(
            CoreError::Conflict(ConflictKind::SelfShare).to_string(),
            "You cannot share with yourself"
        );
    }
}
