use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body as AxumBody;
use axum::http::{Request, Response};
use tokio::{runtime::Handle, task};
use tower::Service;

use tidewater_core::adapter::{guard, internal_server_error};
use tidewater_core::bindings::{BindingSource, EnvBindings, ProcessEnv};
use tidewater_core::build::RequestHandler;
use tidewater_core::error::EdgeError;
use tidewater_core::manifest::ResolvedEnvironment;

use crate::request::into_core_request;
use crate::response::into_axum_response;

/// Tower service running each request through the Edge Adapter guard.
#[derive(Clone)]
pub struct TidewaterAxumService {
    handler: RequestHandler,
    source: Arc<dyn BindingSource + Send + Sync>,
    environment: Arc<ResolvedEnvironment>,
}

impl TidewaterAxumService {
    /// Service reading bindings from the process environment.
    pub fn new(handler: RequestHandler) -> Self {
        Self {
            handler,
            source: Arc::new(ProcessEnv),
            environment: Arc::new(ResolvedEnvironment::default()),
        }
    }

    #[must_use]
    pub fn with_binding_source<S>(mut self, source: S) -> Self
    where
        S: BindingSource + Send + Sync + 'static,
    {
        self.source = Arc::new(source);
        self
    }

    /// Apply the manifest's `[environment]` declarations when resolving bindings.
    #[must_use]
    pub fn with_environment(mut self, environment: ResolvedEnvironment) -> Self {
        self.environment = Arc::new(environment);
        self
    }
}

impl Service<Request<AxumBody>> for TidewaterAxumService {
    type Response = Response<AxumBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<AxumBody>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move {
            let mut core_request = match into_core_request(request).await {
                Ok(core_request) => core_request,
                Err(err) => {
                    log::error!("worker error: {:?}", err);
                    return Ok(into_axum_response(internal_server_error()));
                }
            };

            // Core futures are `!Send`; drive them on this worker thread.
            let response = task::block_in_place(move || {
                Handle::current().block_on(guard(async move {
                    let bindings =
                        EnvBindings::from_source(service.source.as_ref(), &service.environment)
                            .map_err(EdgeError::internal)?;
                    core_request.extensions_mut().insert(Arc::new(bindings));
                    service.handler.handle(core_request).await
                }))
            });
            Ok(into_axum_response(response))
        })
    }
}
