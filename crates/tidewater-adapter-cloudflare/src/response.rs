use futures_util::StreamExt;
use tidewater_core::adapter::INTERNAL_SERVER_ERROR_BODY;
use tidewater_core::body::Body;
use tidewater_core::error::EdgeError;
use tidewater_core::http::Response;
use tidewater_core::response::TEXT_PLAIN;
use worker::{Error as WorkerError, Response as CfResponse};

pub fn from_core_response(response: Response) -> Result<CfResponse, EdgeError> {
    let (parts, body) = response.into_parts();

    let cf_response = match body {
        Body::Once(bytes) if bytes.is_empty() => {
            CfResponse::empty().map_err(EdgeError::internal)?
        }
        Body::Once(bytes) => CfResponse::from_bytes(bytes.to_vec()).map_err(EdgeError::internal)?,
        Body::Stream(stream) => {
            let worker_stream = stream
                .map(|res| match res {
                    Ok(bytes) => Ok::<Vec<u8>, WorkerError>(bytes.to_vec()),
                    Err(err) => Err(WorkerError::RustError(err.to_string())),
                })
                .boxed_local();
            CfResponse::from_stream(worker_stream).map_err(EdgeError::internal)?
        }
    };

    let mut cf_response = cf_response.with_status(parts.status.as_u16());
    let headers = cf_response.headers_mut();
    for (name, value) in parts.headers.iter() {
        if let Ok(value_str) = value.to_str() {
            headers
                .set(name.as_str(), value_str)
                .map_err(EdgeError::internal)?;
        }
    }
    Ok(cf_response)
}

/// Generic 500 built directly on the worker types, for faults where no core response
/// can be converted.
pub fn worker_internal_error() -> Result<CfResponse, WorkerError> {
    let mut response = CfResponse::ok(INTERNAL_SERVER_ERROR_BODY)?.with_status(500);
    response.headers_mut().set("content-type", TEXT_PLAIN)?;
    Ok(response)
}
