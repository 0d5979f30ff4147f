//! Production setup: the real identity provider over HTTP, the on-disk
//! store, and a navigator that hands the reload back to the terminal.

use super::{HandshakeSetup, IdentityProvider, Navigator};
use crate::{logging::LogAndHandleErrorMiddleware, store::FileStore};
use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use std::sync::Arc;
use url::Url;
use voiceiq_core::provider::{AddRequest, GetDataRequest};

/// Implementation of `HandshakeSetup` for the `voiceiq` binary
#[derive(Debug)]
pub struct CliSetup;

impl HandshakeSetup for CliSetup {
    type Provider = HttpIdentityProvider;
    type Store = FileStore;
    type Navigator = TerminalNavigator;
}

/// Talks to the identity provider's `add_request` & `get_data` endpoints
#[derive(Debug, Clone)]
pub struct HttpIdentityProvider {
    client: ClientWithMiddleware,
    endpoint: Url,
}

impl HttpIdentityProvider {
    /// Endpoints are resolved relative to `endpoint`, keeping any path prefix it has
    pub fn new(mut endpoint: Url) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let client = ClientBuilder::new(Client::new())
            .with(LogAndHandleErrorMiddleware)
            .build();
        Self { client, endpoint }
    }

    fn url(&self, endpoint: &str) -> Result<Url> {
        Ok(self.endpoint.join(endpoint)?)
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn add_request(&self, request: &AddRequest) -> Result<String> {
        tracing::info!(email = %request.email, "Requesting identity verification");

        let token = self
            .client
            .post(self.url("add_request")?)
            .form(request)
            .send()
            .await?
            .text()
            .await?;

        let token = token.trim();
        if token.is_empty() {
            bail!("Identity provider returned an empty request token");
        }

        Ok(token.to_string())
    }

    async fn get_data(&self, token: &str) -> Result<String> {
        Ok(self
            .client
            .post(self.url("get_data")?)
            .form(&GetDataRequest {
                token: token.to_string(),
            })
            .send()
            .await?
            .text()
            .await?)
    }
}

/// Remembers the route of the last requested reload.
///
/// The terminal has no page to reload, the `login` command picks the
/// route up once the handshake settles and re-derives the session itself.
#[derive(Debug, Clone, Default)]
pub struct TerminalNavigator {
    route: Arc<Mutex<Option<String>>>,
}

impl TerminalNavigator {
    /// The requested route, if a reload happened since the last call
    pub fn take_reload(&self) -> Option<String> {
        self.route.lock().take()
    }
}

impl Navigator for TerminalNavigator {
    fn hard_reload(&self, route: &str) {
        tracing::info!(route, "Reload requested");
        *self.route.lock() = Some(route.to_string());
    }
}
