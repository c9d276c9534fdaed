use std::net::SocketAddr;

use axum::body::Body as AxumBody;
use axum::extract::connect_info::ConnectInfo;
use axum::http::Request;
use http::header::CONTENT_TYPE;
use http::HeaderValue;
use tidewater_core::body::Body;
use tidewater_core::error::EdgeError;
use tidewater_core::http::Request as CoreRequest;

use crate::context::AxumRequestContext;

/// Convert an axum request into a core request. JSON payloads are buffered so handlers
/// can parse them directly; every other body stays streaming.
pub async fn into_core_request(request: Request<AxumBody>) -> Result<CoreRequest, EdgeError> {
    let (mut parts, body) = request.into_parts();

    let body = match parts.headers.get(CONTENT_TYPE) {
        Some(value) if is_json_content_type(value) => {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|err| EdgeError::bad_request(format!("unreadable JSON body: {err}")))?;
            Body::from_bytes(bytes)
        }
        _ => Body::from_stream(body.into_data_stream()),
    };

    let remote_addr = parts
        .extensions
        .remove::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr);

    let mut core_request = CoreRequest::from_parts(parts, body);
    if let Some(addr) = remote_addr {
        AxumRequestContext::new(addr).attach(&mut core_request);
    }
    Ok(core_request)
}

fn is_json_content_type(value: &HeaderValue) -> bool {
    let Ok(raw) = value.to_str() else {
        return false;
    };

    let media_type = raw.split(';').next().map(str::trim).unwrap_or("");
    let Some((ty, subtype)) = media_type.split_once('/') else {
        return false;
    };
    if !ty.eq_ignore_ascii_case("application") {
        return false;
    }

    let subtype = subtype.trim().to_ascii_lowercase();
    subtype == "json" || subtype.ends_with("+json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidewater_core::http::Method;

    #[tokio::test]
    async fn converts_request_and_records_remote_address() {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri("/species?page=2")
            .header("x-tank", "reef")
            .body(AxumBody::from("payload"))
            .expect("request");
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("127.0.0.1:4000".parse().unwrap()));

        let core_request = into_core_request(request).await.expect("core request");
        assert_eq!(core_request.method(), &Method::POST);
        assert_eq!(core_request.uri().query(), Some("page=2"));
        assert_eq!(core_request.headers()["x-tank"], "reef");
        assert!(core_request.body().is_stream());

        let context = AxumRequestContext::get(&core_request).expect("context");
        assert_eq!(context.remote_addr(), "127.0.0.1:4000".parse().unwrap());
        assert!(core_request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .is_none());
    }

    #[tokio::test]
    async fn json_bodies_are_buffered() {
        let payload = r#"{"species":"Betta splendens"}"#;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/species")
            .header("content-type", "application/json; charset=utf-8")
            .body(AxumBody::from(payload))
            .expect("request");

        let core_request = into_core_request(request).await.expect("core request");
        assert_eq!(core_request.body().as_text(), Some(payload));
        assert!(AxumRequestContext::get(&core_request).is_none());
    }

    #[test]
    fn recognises_json_media_types() {
        for json in [
            "application/json",
            "application/json; charset=utf-8",
            "application/vnd.api+json",
            "APPLICATION/PROBLEM+JSON",
        ] {
            assert!(is_json_content_type(&HeaderValue::from_static(json)), "{json}");
        }
        for other in ["text/json", "application/json+xml", "text/html"] {
            assert!(!is_json_content_type(&HeaderValue::from_static(other)), "{other}");
        }
    }
}
