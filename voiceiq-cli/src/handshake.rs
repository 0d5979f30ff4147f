//! The login handshake: initiate a verification with the identity
//! provider, then poll it until the user completed it somewhere else.
//!
//! A [`Handshake`] reports its progress as [`HandshakeEvent`]s on the
//! channel returned from [`Handshake::new`]. State changes and user-facing
//! notices go there; nothing is returned from the poll loop itself.

use crate::{
    poller::{self, ActivePoll},
    settings::Settings,
    setups::{HandshakeSetup, IdentityProvider, Navigator},
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use voiceiq_core::{
    assertion::IdentityAssertion,
    handshake::{HandshakeState, VerificationRequest},
    provider::AddRequest,
    session::HOME_ROUTE,
    store::save_assertion,
};

pub(crate) const INITIATED: &str =
    "Verification initiated. Please complete authentication in the MauthN app.";
pub(crate) const EXPIRED: &str = "Session expired. Please try again.";
pub(crate) const TIMED_OUT: &str = "Authentication timed out. Please try again.";
pub(crate) const INVALID_DATA: &str = "Authentication failed - invalid data format";
pub(crate) const POLL_FAILED: &str = "Authentication process failed. Please try again.";

/// Timing and fixed client fields of a handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeConfig {
    /// Time between two status polls
    pub interval: Duration,
    /// Ceiling for the whole polling phase
    pub timeout: Duration,
    /// `data` field of the initiation request
    pub request_data: String,
    /// `requester` field of the initiation request
    pub requester: String,
}

impl From<&Settings> for HandshakeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            interval: settings.poll_interval(),
            timeout: settings.poll_timeout(),
            request_data: settings.request_data.clone(),
            requester: settings.requester.clone(),
        }
    }
}

/// Something the user should be told about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeEvent {
    /// The handshake moved to a new state
    State(HandshakeState),
    /// A message for the user
    Notice(Notice),
}

/// Why a handshake couldn't be started
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    /// The email was rejected before contacting the provider
    #[error(transparent)]
    Validation(#[from] voiceiq_core::Error),
    /// The provider couldn't be reached or refused the request
    #[error("{0:#}")]
    Transport(anyhow::Error),
}

/// State shared between a [`Handshake`] and its poll loop.
///
/// Every write to `request` happens while holding its lock. Writes coming
/// from a poll loop check the loop's cancellation token under that lock
/// first, so nothing a cancelled loop does can land.
pub(crate) struct Shared<S: HandshakeSetup> {
    pub(crate) provider: S::Provider,
    pub(crate) store: S::Store,
    pub(crate) navigator: S::Navigator,
    pub(crate) config: HandshakeConfig,
    request: Mutex<VerificationRequest>,
    events: UnboundedSender<HandshakeEvent>,
}

impl<S: HandshakeSetup> Shared<S> {
    pub(crate) fn new(
        provider: S::Provider,
        store: S::Store,
        navigator: S::Navigator,
        config: HandshakeConfig,
    ) -> (Arc<Self>, UnboundedReceiver<HandshakeEvent>) {
        let (events, receiver) = unbounded_channel();
        let shared = Arc::new(Self {
            provider,
            store,
            navigator,
            config,
            request: Mutex::new(VerificationRequest::default()),
            events,
        });
        (shared, receiver)
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // Nobody listening anymore is fine
        let _ = self.events.send(HandshakeEvent::Notice(notice));
    }

    fn transition(&self, request: &mut VerificationRequest, state: HandshakeState) {
        tracing::debug!(from = %request.state, to = %state, "Handshake state change");
        request.state = state;
        let _ = self.events.send(HandshakeEvent::State(state));
    }

    fn reset(&self, request: &mut VerificationRequest) {
        if request.state != HandshakeState::Idle {
            request.reset();
            let _ = self.events.send(HandshakeEvent::State(HandshakeState::Idle));
        }
    }

    /// Pass through a terminal state and back to idle.
    ///
    /// Returns `false` without touching anything if the loop behind `cancel`
    /// was already stopped.
    pub(crate) fn settle(
        &self,
        cancel: &CancellationToken,
        terminal: HandshakeState,
        notice: Notice,
    ) -> bool {
        let mut request = self.request.lock();
        if cancel.is_cancelled() {
            return false;
        }
        cancel.cancel();

        self.transition(&mut request, terminal);
        self.reset(&mut request);
        self.notify(notice);
        true
    }

    /// Persist a verified identity and reload the application, at most once per loop
    pub(crate) fn succeed(&self, cancel: &CancellationToken, assertion: &IdentityAssertion) -> bool {
        let mut request = self.request.lock();
        if cancel.is_cancelled() {
            return false;
        }
        cancel.cancel();

        if let Err(e) = save_assertion(&self.store, assertion) {
            tracing::error!(%e, "Couldn't persist identity assertion");
            self.transition(&mut request, HandshakeState::Failed);
            self.reset(&mut request);
            self.notify(Notice::error(format!("Couldn't store your identity: {e:#}")));
            return true;
        }

        tracing::info!(email = %assertion.email, "Identity verified");
        self.navigator.hard_reload(HOME_ROUTE);
        self.transition(&mut request, HandshakeState::Succeeded);
        self.reset(&mut request);
        true
    }
}

/// One login dialog: at most one verification in flight at any time.
pub struct Handshake<S: HandshakeSetup> {
    shared: Arc<Shared<S>>,
    active: Option<ActivePoll>,
}

impl<S: HandshakeSetup> Handshake<S> {
    pub fn new(
        provider: S::Provider,
        store: S::Store,
        navigator: S::Navigator,
        config: HandshakeConfig,
    ) -> (Self, UnboundedReceiver<HandshakeEvent>) {
        let (shared, events) = Shared::new(provider, store, navigator, config);
        (
            Self {
                shared,
                active: None,
            },
            events,
        )
    }

    pub fn state(&self) -> HandshakeState {
        self.shared.request.lock().state
    }

    pub fn request(&self) -> VerificationRequest {
        self.shared.request.lock().clone()
    }

    pub fn store(&self) -> &S::Store {
        &self.shared.store
    }

    pub fn navigator(&self) -> &S::Navigator {
        &self.shared.navigator
    }

    /// Whether a poll loop is still running
    pub fn is_polling(&self) -> bool {
        self.active.as_ref().is_some_and(ActivePoll::is_running)
    }

    /// Validate the email, request a verification and start polling for it.
    ///
    /// Any previous poll loop is stopped first. Returns once polling began;
    /// the outcome arrives as events.
    pub async fn start(&mut self, email: &str) -> Result<(), StartError> {
        let config = &self.shared.config;
        let add_request = match AddRequest::new(
            email,
            config.request_data.clone(),
            config.requester.clone(),
        ) {
            Ok(add_request) => add_request,
            Err(e) => {
                tracing::debug!(%e, "Rejected email");
                self.shared.notify(Notice::error(e.to_string()));
                return Err(e.into());
            }
        };

        self.cancel().await;

        {
            let mut request = self.shared.request.lock();
            self.shared.transition(&mut request, HandshakeState::Submitting);
        }

        let result = self.shared.provider.add_request(&add_request).await;

        let mut request = self.shared.request.lock();
        match result {
            Ok(token) => {
                tracing::info!(%token, "Verification requested, polling");
                request.token = Some(token.clone());
                self.shared.transition(&mut request, HandshakeState::Polling);
                drop(request);

                self.shared.notify(Notice::info(INITIATED));
                self.active = Some(poller::spawn(Arc::clone(&self.shared), token));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "Identity provider request failed");
                self.shared.transition(&mut request, HandshakeState::Failed);
                self.shared.reset(&mut request);
                drop(request);

                self.shared.notify(Notice::error(format!("{e:#}")));
                Err(StartError::Transport(e))
            }
        }
    }

    /// Stop polling and go back to idle. Safe to call any number of times.
    pub async fn cancel(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        {
            let mut request = self.shared.request.lock();
            active.cancel();
            self.shared.reset(&mut request);
        }

        active.join().await;
    }
}

impl<S: HandshakeSetup> Drop for Handshake<S> {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel();
        }
    }
}
