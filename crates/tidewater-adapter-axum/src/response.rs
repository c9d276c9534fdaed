use axum::body::Body as AxumBody;
use axum::http::Response;
use futures::executor::block_on;
use tidewater_core::adapter::internal_server_error;
use tidewater_core::body::Body;
use tidewater_core::http::Response as CoreResponse;
use tracing::error;

/// Convert a core response for hyper.
///
/// Streaming bodies are collected first: core streams are `!Send`, which hyper cannot
/// drive. Rendered documents are buffered already, so this only affects custom handlers.
pub fn into_axum_response(response: CoreResponse) -> Response<AxumBody> {
    let (mut parts, body) = response.into_parts();
    let body = match body {
        Body::Once(bytes) => AxumBody::from(bytes),
        Body::Stream(stream) => match block_on(Body::Stream(stream).collect()) {
            Ok(bytes) => {
                parts.headers.remove(http::header::TRANSFER_ENCODING);
                AxumBody::from(bytes)
            }
            Err(err) => {
                error!("worker error: streaming response failed: {err}");
                return into_axum_response(internal_server_error());
            }
        },
    };

    Response::from_parts(parts, body)
}
