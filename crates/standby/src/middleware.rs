//! HTTP adapter: hold requests until the file they ask for exists.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use percent_encoding::percent_decode_str;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::waiter::Waiter;

/// Something the waiter can put its middleware in front of.
pub trait Handleable {
    fn handle(self, waiter: &Arc<Waiter>) -> Self;
}

impl<S> Handleable for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn handle(self, waiter: &Arc<Waiter>) -> Self {
        self.layer(middleware::from_fn_with_state(
            Arc::clone(waiter),
            wait_for_artifact,
        ))
    }
}

impl Waiter {
    /// Install the waiting middleware on `target`.
    pub fn handle<H: Handleable>(self: &Arc<Self>, target: H) -> H {
        target.handle(self)
    }
}

/// Middleware that waits for the artifact named by the request path.
///
/// The path is percent-decoded first; paths that don't decode to UTF-8 are
/// passed along without waiting.
///
/// Answers `500` when the request's deadline passes first; otherwise hands the
/// request to the inner service untouched. A client that disconnects drops
/// this future, which ends the wait with it.
pub async fn wait_for_artifact(
    State(waiter): State<Arc<Waiter>>,
    request: Request,
    next: Next,
) -> Response {
    // Wait on the name the file server will look up, not the encoded form
    let decoded = percent_decode_str(request.uri().path())
        .decode_utf8()
        .map(|path| path.into_owned());
    let Ok(path) = decoded else {
        return next.run(request).await;
    };
    let cancel = CancellationToken::new();
    let deadline = waiter.request_timeout().map(|timeout| Instant::now() + timeout);

    match waiter.wait_until(&path, &cancel, deadline).await {
        Err(e) if e.is_cancellation() => {
            warn!(path = %path, error = %e, "Request gave up waiting for artifact");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        _ => next.run(request).await,
    }
}
