use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::task::{Context, Poll};

use matchit::Router as PathRouter;
use serde::Serialize;
use tower_service::Service;

use crate::body::Body;
use crate::context::RequestContext;
use crate::error::EdgeError;
use crate::handler::{BoxHandler, IntoHandler};
use crate::http::{
    header::CONTENT_TYPE, response_builder, HandlerFuture, HeaderValue, Method, Request,
    Response, StatusCode,
};
use crate::middleware::{BoxMiddleware, Middleware, Next};
use crate::params::PathParams;

pub const DEFAULT_ROUTE_LISTING_PATH: &str = "/__tidewater/routes";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    #[serde(serialize_with = "serialize_method")]
    method: Method,
    path: String,
}

fn serialize_method<S>(method: &Method, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(method.as_str())
}

impl RouteInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Default)]
pub struct RouterBuilder {
    routes: HashMap<Method, PathRouter<BoxHandler>>,
    middlewares: Vec<BoxMiddleware>,
    route_info: Vec<RouteInfo>,
    route_listing_path: Option<String>,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a JSON listing of every registered route at [`DEFAULT_ROUTE_LISTING_PATH`].
    pub fn enable_route_listing(self) -> Self {
        self.enable_route_listing_at(DEFAULT_ROUTE_LISTING_PATH)
    }

    pub fn enable_route_listing_at<S>(mut self, path: S) -> Self
    where
        S: Into<String>,
    {
        let path = path.into();
        assert!(
            path.starts_with('/'),
            "route listing path must begin with '/'"
        );
        self.route_listing_path = Some(path);
        self
    }

    pub fn route<H>(mut self, path: &str, method: Method, handler: H) -> Self
    where
        H: IntoHandler,
    {
        self.insert(path, method, handler.into_handler());
        self
    }

    pub fn get<H: IntoHandler>(self, path: &str, handler: H) -> Self {
        self.route(path, Method::GET, handler)
    }

    pub fn post<H: IntoHandler>(self, path: &str, handler: H) -> Self {
        self.route(path, Method::POST, handler)
    }

    pub fn put<H: IntoHandler>(self, path: &str, handler: H) -> Self {
        self.route(path, Method::PUT, handler)
    }

    pub fn delete<H: IntoHandler>(self, path: &str, handler: H) -> Self {
        self.route(path, Method::DELETE, handler)
    }

    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware,
    {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn build(mut self) -> RouterService {
        if let Some(path) = self.route_listing_path.take() {
            let mut listing = self.route_info.clone();
            listing.push(RouteInfo::new(Method::GET, path.clone()));
            let listing = Arc::new(listing);

            let handler = move |_ctx: RequestContext| {
                let listing = Arc::clone(&listing);
                async move {
                    let body = Body::json(listing.as_ref()).map_err(EdgeError::internal)?;
                    response_builder()
                        .status(StatusCode::OK)
                        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                        .body(body)
                        .map_err(EdgeError::internal)
                }
            };
            self.insert(&path, Method::GET, handler.into_handler());
        }

        RouterService {
            inner: Arc::new(RouterInner {
                routes: self.routes,
                middlewares: self.middlewares,
                route_info: self.route_info,
            }),
        }
    }

    fn insert(&mut self, path: &str, method: Method, handler: BoxHandler) {
        self.routes
            .entry(method.clone())
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|err| panic!("duplicate route definition for {path}: {err}"));
        self.route_info.push(RouteInfo::new(method, path));
    }
}

/// Route table plus middleware chain, shared cheaply across invocations.
#[derive(Clone)]
pub struct RouterService {
    inner: Arc<RouterInner>,
}

impl RouterService {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn routes(&self) -> &[RouteInfo] {
        &self.inner.route_info
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response, EdgeError> {
        self.inner.dispatch(request).await
    }
}

struct RouterInner {
    routes: HashMap<Method, PathRouter<BoxHandler>>,
    middlewares: Vec<BoxMiddleware>,
    route_info: Vec<RouteInfo>,
}

enum RouteMatch<'a> {
    Found(&'a BoxHandler, PathParams),
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl RouterInner {
    async fn dispatch(&self, request: Request) -> Result<Response, EdgeError> {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        match self.find_route(&method, &path) {
            RouteMatch::Found(handler, params) => {
                let ctx = RequestContext::new(request, params);
                Next::new(&self.middlewares, handler.as_ref()).run(ctx).await
            }
            RouteMatch::MethodNotAllowed(allowed) => {
                Err(EdgeError::method_not_allowed(&method, &allowed))
            }
            RouteMatch::NotFound => Err(EdgeError::not_found(path)),
        }
    }

    fn find_route(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        if let Some(matched) = self
            .routes
            .get(method)
            .and_then(|router| router.at(path).ok())
        {
            let params = matched.params.iter().collect();
            return RouteMatch::Found(matched.value, params);
        }

        let allowed: BTreeSet<&str> = self
            .routes
            .iter()
            .filter(|(_, router)| router.at(path).is_ok())
            .map(|(candidate, _)| candidate.as_str())
            .collect();

        if allowed.is_empty() {
            RouteMatch::NotFound
        } else {
            RouteMatch::MethodNotAllowed(
                allowed
                    .into_iter()
                    .filter_map(|name| Method::from_bytes(name.as_bytes()).ok())
                    .collect(),
            )
        }
    }
}

impl Service<Request> for RouterService {
    type Response = Response;
    type Error = EdgeError;
    type Future = HandlerFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move { inner.dispatch(request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request_builder;
    use futures::executor::block_on;
    use serde::Deserialize;

    fn request(method: Method, uri: &str) -> Request {
        request_builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request")
    }

    async fn ok(_ctx: RequestContext) -> Result<&'static str, EdgeError> {
        Ok("ok")
    }

    #[test]
    fn matches_route_and_captures_params() {
        #[derive(Deserialize)]
        struct Params {
            slug: String,
        }

        async fn species(ctx: RequestContext) -> Result<String, EdgeError> {
            let params: Params = ctx.path()?;
            Ok(format!("species {}", params.slug))
        }

        let router = RouterService::builder()
            .get("/species/{slug}", species)
            .build();
        let response =
            block_on(router.dispatch(request(Method::GET, "/species/corydoras"))).expect("ok");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_text(), Some("species corydoras"));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let router = RouterService::builder().get("/", ok).build();
        let err = block_on(router.dispatch(request(Method::GET, "/nowhere"))).expect_err("404");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn wrong_method_lists_allowed_methods() {
        let router = RouterService::builder()
            .post("/submit", ok)
            .put("/submit", ok)
            .build();
        let err = block_on(router.dispatch(request(Method::GET, "/submit"))).expect_err("405");
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(err.message().ends_with("allowed: POST, PUT"));
    }

    #[test]
    fn route_listing_includes_itself() {
        let router = RouterService::builder()
            .enable_route_listing()
            .get("/", ok)
            .delete("/cache", ok)
            .build();

        let response = block_on(router.dispatch(request(Method::GET, DEFAULT_ROUTE_LISTING_PATH)))
            .expect("listing");
        let payload: serde_json::Value = response.body().to_json().expect("json");
        let entries = payload.as_array().expect("array");
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&serde_json::json!({ "method": "DELETE", "path": "/cache" })));
        assert!(entries.contains(&serde_json::json!({
            "method": "GET",
            "path": DEFAULT_ROUTE_LISTING_PATH
        })));
    }

    #[test]
    fn routes_reports_registered_entries() {
        let router = RouterService::builder().get("/", ok).post("/", ok).build();
        let routes = router.routes();
        assert_eq!(routes.len(), 2);
        assert!(routes.contains(&RouteInfo::new(Method::POST, "/")));
    }

    #[test]
    #[should_panic(expected = "duplicate route definition")]
    fn duplicate_route_panics() {
        let _ = RouterService::builder().get("/", ok).get("/", ok).build();
    }

    #[test]
    fn tower_service_call_dispatches() {
        let mut router = RouterService::builder().get("/", ok).build();
        let response = block_on(router.call(request(Method::GET, "/"))).expect("ok");
        assert_eq!(response.body().as_text(), Some("ok"));
    }
}
