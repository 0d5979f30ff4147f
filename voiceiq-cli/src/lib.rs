//! voiceiq command line client: sign in through the MauthN identity provider
pub mod cli;
pub mod handshake;
pub mod logging;
pub mod paths;
pub(crate) mod poller;
pub mod settings;
pub mod setups;
pub mod store;
