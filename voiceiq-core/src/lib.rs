#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! voiceiq-core
//!
//! Domain types of the external identity handshake: the verified identity
//! assertion, the provider's wire format, the handshake states, the
//! durable key-value store port and the session reconciliation on top of it.

pub mod assertion;
pub mod error;
pub mod handshake;
pub mod provider;
pub mod session;
pub mod store;

pub use error::Error;
