//! Error types for device authentication

use thiserror::Error;

/// Errors raised by the challenge/response protocol.
///
/// None of these are fatal; the gateway maps them to 400/401 responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid device identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid device info or challenge code expired")]
    ChallengeNotFound,

    #[error("Challenge code expired ({age_ms}ms old, limit {ttl_ms}ms)")]
    ChallengeExpired { age_ms: u128, ttl_ms: u128 },

    #[error("Invalid modified code")]
    InvalidResponse,

    #[error("You are not authorized to access this resource.")]
    Unauthorized,
}

impl AuthError {
    /// True for errors that mean "not logged in" rather than "bad request".
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthError::Unauthorized)
    }
}
