//! The status poll loop of a handshake.
//!
//! The loop owns both the interval and the hard timeout. It polls once right
//! away, then once per interval, and waits for each response before the next
//! tick so requests never overlap.

use crate::{
    handshake::{Notice, Shared, EXPIRED, INVALID_DATA, POLL_FAILED, TIMED_OUT},
    setups::{HandshakeSetup, IdentityProvider},
};
use anyhow::Result;
use std::{sync::Arc, time::Duration};
use tokio::{
    task::JoinHandle,
    time::{interval, sleep, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use voiceiq_core::{
    handshake::HandshakeState,
    provider::{classify, PollResponse},
};

/// Handle on a running poll loop
#[derive(Debug)]
pub(crate) struct ActivePoll {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ActivePoll {
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait for the loop to fully stop
    pub(crate) async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(%e, "Poll loop crashed");
        }
    }
}

/// Whether the loop should keep going after a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Stop,
}

pub(crate) fn spawn<S: HandshakeSetup>(shared: Arc<Shared<S>>, token: String) -> ActivePoll {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(shared, cancel.clone(), token));
    ActivePoll { cancel, task }
}

#[tracing::instrument(skip(shared, cancel))]
async fn run<S: HandshakeSetup>(shared: Arc<Shared<S>>, cancel: CancellationToken, token: String) {
    let deadline = sleep(shared.config.timeout);
    tokio::pin!(deadline);

    let mut ticker = interval(shared.config.interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = &mut deadline => {
                timed_out(&shared, &cancel);
                break;
            }
            _ = ticker.tick() => {}
        }

        // An in-flight request is dropped together with its response
        // if the loop gets stopped meanwhile.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = &mut deadline => {
                timed_out(&shared, &cancel);
                break;
            }
            response = shared.provider.get_data(&token) => response,
        };

        if apply(&shared, &cancel, response) == Flow::Stop {
            break;
        }
    }

    tracing::debug!("Poll loop stopped");
}

fn timed_out<S: HandshakeSetup>(shared: &Shared<S>, cancel: &CancellationToken) {
    tracing::warn!(timeout = ?shared.config.timeout, "No verification result in time");
    shared.settle(cancel, HandshakeState::TimedOut, Notice::error(TIMED_OUT));
}

/// React to one status response
pub(crate) fn apply<S: HandshakeSetup>(
    shared: &Shared<S>,
    cancel: &CancellationToken,
    response: Result<String>,
) -> Flow {
    if cancel.is_cancelled() {
        return Flow::Stop;
    }

    let body = match response {
        Ok(body) => body,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "Polling the identity provider failed");
            shared.settle(cancel, HandshakeState::Failed, Notice::error(POLL_FAILED));
            return Flow::Stop;
        }
    };

    tracing::debug!(%body, "Identity provider status response");

    match classify(&body) {
        Ok(PollResponse::Pending) => Flow::Continue,
        Ok(PollResponse::Unrecognized(body)) => {
            tracing::warn!(%body, "Unrecognized identity provider response");
            Flow::Continue
        }
        Ok(PollResponse::Expired) => {
            shared.settle(cancel, HandshakeState::Expired, Notice::error(EXPIRED));
            Flow::Stop
        }
        Ok(PollResponse::Verified(assertion)) => {
            if !shared.succeed(cancel, &assertion) {
                tracing::debug!("Ignoring verification result of a stopped poll loop");
            }
            Flow::Stop
        }
        Err(e) => {
            tracing::error!(%e, raw = %body, "Failed to parse identity provider response");
            shared.settle(cancel, HandshakeState::Failed, Notice::error(INVALID_DATA));
            Flow::Stop
        }
    }
}
