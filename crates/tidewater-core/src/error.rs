use anyhow::Error as AnyError;
use serde_json::json;
use thiserror::Error;

use crate::body::Body;
use crate::http::{header::CONTENT_TYPE, HeaderValue, Method, Response, StatusCode};
use crate::response::{response_with_body, IntoResponse};

/// Error raised while routing or rendering a request. Carries the HTTP status the
/// Error Boundary reports for it.
#[derive(Debug, Error)]
pub enum EdgeError {
    #[error("{message}")]
    BadRequest { message: String },
    #[error("no route matched path: {path}")]
    NotFound { path: String },
    #[error("method {method} not allowed; allowed: {allowed}")]
    MethodNotAllowed { method: Method, allowed: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("{source}")]
    Internal {
        #[from]
        source: AnyError,
    },
}

impl EdgeError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        EdgeError::BadRequest {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        EdgeError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        EdgeError::NotFound { path: path.into() }
    }

    pub fn method_not_allowed(method: &Method, allowed: &[Method]) -> Self {
        let mut names: Vec<&str> = allowed.iter().map(Method::as_str).collect();
        names.sort_unstable();
        let allowed = if names.is_empty() {
            "(none)".to_string()
        } else {
            names.join(", ")
        };
        EdgeError::MethodNotAllowed {
            method: method.clone(),
            allowed,
        }
    }

    pub fn internal<E>(error: E) -> Self
    where
        E: Into<AnyError>,
    {
        EdgeError::Internal {
            source: error.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            EdgeError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            EdgeError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EdgeError::NotFound { .. } => StatusCode::NOT_FOUND,
            EdgeError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            EdgeError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Underlying cause for internal errors.
    pub fn source_error(&self) -> Option<&AnyError> {
        match self {
            EdgeError::Internal { source } => Some(source),
            _ => None,
        }
    }

    /// Route errors are the expected outcomes of request handling (bad input, unknown
    /// path); everything else is an unexpected fault.
    pub fn is_route_error(&self) -> bool {
        !matches!(self, EdgeError::Internal { .. })
    }
}

impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let payload = json!({
            "error": {
                "status": status.as_u16(),
                "message": self.message(),
            }
        });

        let body = Body::json(&payload).unwrap_or_else(|_| Body::text("internal error"));
        let mut response = response_with_body(status, body);
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
