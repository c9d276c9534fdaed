use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::bindings::EnvBindings;
use crate::body::Body;
use crate::build::ServerMode;
use crate::error::EdgeError;
use crate::http::Request;
use crate::params::PathParams;

/// Request context exposed to handlers and middleware.
pub struct RequestContext {
    request: Request,
    path_params: PathParams,
}

impl RequestContext {
    pub fn new(request: Request, path_params: PathParams) -> Self {
        Self {
            request,
            path_params,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn into_request(self) -> Request {
        self.request
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn body(&self) -> &Body {
        self.request.body()
    }

    pub fn path<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        self.path_params
            .deserialize()
            .map_err(|err| EdgeError::bad_request(format!("invalid path parameters: {err}")))
    }

    pub fn query<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        let query = self.request.uri().query().unwrap_or("");
        serde_urlencoded::from_str(query)
            .map_err(|err| EdgeError::bad_request(format!("invalid query string: {err}")))
    }

    pub fn json<T>(&self) -> Result<T, EdgeError>
    where
        T: DeserializeOwned,
    {
        self.request
            .body()
            .to_json()
            .map_err(|err| EdgeError::bad_request(format!("invalid JSON payload: {err}")))
    }

    /// Environment bindings attached by the runtime adapter for this invocation.
    pub fn bindings(&self) -> Option<Arc<EnvBindings>> {
        self.request.extensions().get::<Arc<EnvBindings>>().cloned()
    }

    /// Mode the request handler was created with; production when unset.
    pub fn mode(&self) -> ServerMode {
        self.request
            .extensions()
            .get::<ServerMode>()
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::tests::sample_bindings;
    use crate::http::{request_builder, Method, StatusCode};
    use serde::Deserialize;

    fn ctx(uri: &str, body: Body, params: PathParams) -> RequestContext {
        let request = request_builder()
            .method(Method::GET)
            .uri(uri)
            .body(body)
            .expect("request");
        RequestContext::new(request, params)
    }

    #[test]
    fn path_deserialises_params() {
        #[derive(Deserialize)]
        struct Params {
            slug: String,
        }
        let params: PathParams = [("slug", "neon-tetra")].into_iter().collect();
        let ctx = ctx("/species/neon-tetra", Body::empty(), params);
        let parsed: Params = ctx.path().expect("params");
        assert_eq!(parsed.slug, "neon-tetra");
    }

    #[test]
    fn invalid_path_is_bad_request() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Params {
            id: u32,
        }
        let params: PathParams = [("id", "not-a-number")].into_iter().collect();
        let ctx = ctx("/tanks/not-a-number", Body::empty(), params);
        let err = ctx.path::<Params>().expect_err("error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("invalid path parameters"));
    }

    #[test]
    fn query_defaults_when_absent() {
        #[derive(Deserialize)]
        struct Query {
            page: Option<u32>,
        }
        let ctx = ctx("/", Body::empty(), PathParams::default());
        let parsed: Query = ctx.query().expect("query");
        assert_eq!(parsed.page, None);
    }

    #[test]
    fn invalid_query_is_bad_request() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Query {
            page: u32,
        }
        let ctx = ctx("/?page=many", Body::empty(), PathParams::default());
        let err = ctx.query::<Query>().expect_err("error");
        assert!(err.message().contains("invalid query string"));
    }

    #[test]
    fn invalid_json_is_bad_request() {
        let ctx = ctx("/", Body::from("{not json"), PathParams::default());
        let err = ctx.json::<serde_json::Value>().expect_err("error");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn bindings_and_mode_come_from_extensions() {
        let bare = ctx("/", Body::empty(), PathParams::default());
        assert!(bare.bindings().is_none());

        let mut request = request_builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        request
            .extensions_mut()
            .insert(Arc::new(sample_bindings()));
        request.extensions_mut().insert(ServerMode::Development);
        let ctx = RequestContext::new(request, PathParams::default());

        let bindings = ctx.bindings().expect("bindings");
        assert_eq!(bindings.site_url(), "https://www.seriouslyfish.test");
        assert_eq!(ctx.mode(), ServerMode::Development);
    }

    #[test]
    fn mode_defaults_to_production() {
        let ctx = ctx("/", Body::empty(), PathParams::default());
        assert_eq!(ctx.mode(), ServerMode::Production);
    }
}
