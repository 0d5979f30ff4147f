//! Handshake states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a login handshake currently is.
///
/// Terminal states are only ever passed through: the handshake resets to
/// [`HandshakeState::Idle`] right after reaching one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    /// Nothing in flight
    #[default]
    Idle,
    /// Waiting for the provider to hand out a request token
    Submitting,
    /// Polling the provider for the verification result
    Polling,
    /// The assertion was received and persisted
    Succeeded,
    /// The provider expired the request
    Expired,
    /// No terminal response arrived before the ceiling
    TimedOut,
    /// Transport or payload failure
    Failed,
}

impl HandshakeState {
    /// Whether the handshake can't continue polling from this state
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Expired | Self::TimedOut | Self::Failed
        )
    }

    /// Whether the user should see a progress indicator
    pub fn is_in_progress(self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::Polling => "polling",
            Self::Succeeded => "succeeded",
            Self::Expired => "expired",
            Self::TimedOut => "timed_out",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// An in-flight handshake
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerificationRequest {
    /// Token handed out by the provider, present while polling
    pub token: Option<String>,
    /// Current state
    pub state: HandshakeState,
}

impl VerificationRequest {
    /// Drop the token and go back to idle
    pub fn reset(&mut self) {
        self.token = None;
        self.state = HandshakeState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        let terminal = [
            HandshakeState::Succeeded,
            HandshakeState::Expired,
            HandshakeState::TimedOut,
            HandshakeState::Failed,
        ];
        for state in terminal {
            assert!(state.is_terminal(), "{state} should be terminal");
            assert!(!state.is_in_progress());
        }
        for state in [
            HandshakeState::Idle,
            HandshakeState::Submitting,
            HandshakeState::Polling,
        ] {
            assert!(!state.is_terminal(), "{state} shouldn't be terminal");
        }
    }

    #[test]
    fn test_reset_clears_token() {
        let mut request = VerificationRequest {
            token: Some("abc123".to_string()),
            state: HandshakeState::Polling,
        };
        request.reset();
        assert_eq!(request, VerificationRequest::default());
    }
}
