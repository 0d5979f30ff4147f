//! Wire format of the identity provider.
//!
//! The provider answers both endpoints with plain text. Whether a status
//! response carries the verified identity is only recognizable from its
//! shape (a JSON array wrapped as `[{...}]`), so all of that sniffing is
//! kept in [`classify`] and the rest of the code matches on [`PollResponse`].

use crate::{assertion::IdentityAssertion, Error};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Form body of the `add_request` endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRequest {
    /// Trimmed, lower-cased email of the user to verify
    pub email: String,
    /// Fixed client data field
    pub data: String,
    /// Fixed client identifier
    pub requester: String,
}

impl AddRequest {
    /// Validate and normalize a user-typed email into an initiation request.
    ///
    /// Fails fast with [`Error::InvalidEmail`], before anything touches the network.
    pub fn new(
        email: &str,
        data: impl Into<String>,
        requester: impl Into<String>,
    ) -> Result<Self, Error> {
        Ok(Self {
            email: normalize_email(email)?,
            data: data.into(),
            requester: requester.into(),
        })
    }
}

/// Form body of the `get_data` endpoint
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataRequest {
    /// Opaque token returned by `add_request`
    pub token: String,
}

/// Trim and lower-case an email, rejecting anything without an `@`
pub fn normalize_email(email: &str) -> Result<String, Error> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(Error::InvalidEmail);
    }
    Ok(email)
}

/// What a `get_data` response means for the handshake
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollResponse {
    /// The user completed verification
    Verified(IdentityAssertion),
    /// The request expired on the provider's side
    Expired,
    /// The user hasn't completed verification yet
    Pending,
    /// Anything else. Treated as transient.
    Unrecognized(String),
}

/// Classify a raw `get_data` response body.
///
/// A body that looks like `[{...}]` must parse into a valid assertion,
/// otherwise this fails closed with a payload error.
pub fn classify(body: &str) -> Result<PollResponse, Error> {
    let trimmed = body.trim();

    if trimmed.starts_with("[{") && trimmed.ends_with("}]") {
        return parse_assertion(trimmed).map(PollResponse::Verified);
    }

    if trimmed.to_lowercase().contains("expired") {
        return Ok(PollResponse::Expired);
    }

    if trimmed.contains("pending") {
        return Ok(PollResponse::Pending);
    }

    Ok(PollResponse::Unrecognized(trimmed.to_string()))
}

fn parse_assertion(payload: &str) -> Result<IdentityAssertion, Error> {
    let assertions: Vec<IdentityAssertion> = serde_json::from_str(payload)?;
    let assertion = assertions
        .into_iter()
        .next()
        .ok_or_else(|| Error::InvalidPayload("empty identity list".to_string()))?;
    assertion.validate()?;
    Ok(assertion)
}
