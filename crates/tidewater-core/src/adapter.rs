//! Edge Adapter tier: the outermost safety net around a runtime invocation.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::body::Body;
use crate::boundary::panic_message;
use crate::error::EdgeError;
use crate::http::{Response, StatusCode};
use crate::response::response_with_body;

pub const INTERNAL_SERVER_ERROR_BODY: &str = "Internal Server Error";

/// Generic 500 reply that reveals nothing about the underlying fault.
pub fn internal_server_error() -> Response {
    response_with_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        Body::text(INTERNAL_SERVER_ERROR_BODY),
    )
}

/// Await the delegated call and return its response unchanged. Errors and panics are
/// logged and answered with [`internal_server_error`].
pub async fn guard<F>(call: F) -> Response
where
    F: Future<Output = Result<Response, EdgeError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            log::error!("worker error: {:?}", err);
            internal_server_error()
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref()).unwrap_or("unknown panic payload");
            log::error!("worker error: panic: {}", message);
            internal_server_error()
        }
    }
}
