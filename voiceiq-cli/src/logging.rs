use anyhow::anyhow;
use reqwest::{Request, Response};
use reqwest_middleware::{Middleware, Next};
use task_local_extensions::Extensions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Logs every provider request and turns non-2xx responses into errors
/// that carry the response body, so callers only deal with successes.
#[derive(Debug)]
pub(crate) struct LogAndHandleErrorMiddleware;

#[async_trait::async_trait]
impl Middleware for LogAndHandleErrorMiddleware {
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: Next<'_>,
    ) -> reqwest_middleware::Result<Response> {
        tracing::debug!(url = %req.url(), method = %req.method(), "Running request");

        let resp = next.run(req, extensions).await?;
        let status = resp.status();

        if status.is_success() {
            tracing::debug!(?status, content_length = ?resp.content_length(), "Got response");
            return Ok(resp);
        }

        let body = resp.text().await?;
        let kind = if status.is_client_error() {
            "Client"
        } else if status.is_server_error() {
            "Server"
        } else {
            "Unexpected"
        };
        tracing::error!(?status, %body, "{kind} error on response");
        Err(anyhow!("{kind} error (status code {status}): {}", body.trim()).into())
    }
}

pub(crate) fn setup_tracing(ansi: bool) {
    // A second init (e.g. running several commands in one test process) is fine to ignore
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(ansi)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::from_default_env())
        .try_init();
}
