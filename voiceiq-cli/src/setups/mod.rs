//! This abstracts the handshake's side-effects into "setups".
//!
//! This module defines the traits, submodules define test & production
//! collections of implementations.
use anyhow::Result;
use async_trait::async_trait;
use voiceiq_core::{provider::AddRequest, store::KeyValueStore};

pub mod prod;

/// This trait groups type parameters to the `Handshake` struct.
///
/// It captures how the handshake talks to the outside world,
/// distinguishing between e.g. unit testing & production setups.
pub trait HandshakeSetup: Send + Sync + 'static {
    /// Which identity provider to verify users with
    type Provider: IdentityProvider;
    /// Where verified identities are persisted
    type Store: KeyValueStore + 'static;
    /// How to force the application to re-derive its session
    type Navigator: Navigator;
}

/// The two endpoints of the external identity provider.
///
/// Both return the raw plain-text response body of a successful request.
/// Non-success responses and network failures are errors.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Start a verification, returns the opaque request token
    async fn add_request(&self, request: &AddRequest) -> Result<String>;

    /// Ask for the status of a verification
    async fn get_data(&self, token: &str) -> Result<String>;
}

/// Full application navigation
pub trait Navigator: Send + Sync + 'static {
    /// Leave the current screen for `route`, re-deriving all session state
    fn hard_reload(&self, route: &str);
}
