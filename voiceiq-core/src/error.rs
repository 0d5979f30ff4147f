//! Error type for the core domain

use validator::ValidationErrors;

/// Errors raised while validating user input or provider payloads
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The email typed by the user is empty or lacks an `@`
    #[error("Please enter a valid email address")]
    InvalidEmail,

    /// The provider signalled a ready payload, but it isn't shaped like one
    #[error("invalid data format: {0}")]
    InvalidPayload(String),

    /// The payload parsed, but required identity fields are missing or empty
    #[error("invalid identity assertion: {0}")]
    InvalidAssertion(#[from] ValidationErrors),

    /// The payload isn't valid JSON
    #[error("invalid data format: {0}")]
    Json(#[from] serde_json::Error),
}
