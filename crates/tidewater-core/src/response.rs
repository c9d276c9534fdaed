use crate::body::Body;
use crate::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    response_builder, HeaderValue, Response, StatusCode,
};

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Convert common return types into `Response`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

/// Plain-text response wrapper.
pub struct Text<T>(T);

impl<T> Text<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }
}

impl<T> IntoResponse for Text<T>
where
    T: Into<String>,
{
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self.0))
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::NO_CONTENT, Body::empty())
    }
}

impl<T> IntoResponse for (StatusCode, T)
where
    T: IntoResponse,
{
    fn into_response(self) -> Response {
        let (status, inner) = self;
        let mut response = inner.into_response();
        *response.status_mut() = status;
        response
    }
}

/// Build a response, labelling non-empty buffered bodies as plain text.
pub fn response_with_body(status: StatusCode, body: Body) -> Response {
    response_with_content_type(status, body, TEXT_PLAIN)
}

/// Build a response with an explicit content type for non-empty buffered bodies.
pub fn response_with_content_type(
    status: StatusCode,
    body: Body,
    content_type: &'static str,
) -> Response {
    let mut builder = response_builder().status(status);

    if let Body::Once(ref bytes) = body {
        if !bytes.is_empty() {
            builder = builder
                .header(CONTENT_LENGTH, bytes.len())
                .header(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    builder
        .body(body)
        .expect("static response builder should not fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
        response.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn text_bodies_get_length_and_plain_type() {
        let response = "shrimp".into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, "content-length"), Some("6"));
        assert_eq!(header(&response, "content-type"), Some(TEXT_PLAIN));
    }

    #[test]
    fn empty_body_has_no_entity_headers() {
        let response = response_with_body(StatusCode::OK, Body::empty());
        assert!(response.headers().get(CONTENT_LENGTH).is_none());
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn explicit_content_type_is_applied() {
        let response =
            response_with_content_type(StatusCode::OK, Body::from("<p>hi</p>"), TEXT_HTML);
        assert_eq!(header(&response, "content-type"), Some(TEXT_HTML));
    }

    #[test]
    fn unit_is_no_content() {
        let response = ().into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[test]
    fn status_tuple_overrides_status() {
        let response = (StatusCode::ACCEPTED, Text::new("queued")).into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.body().as_text(), Some("queued"));
    }
}
