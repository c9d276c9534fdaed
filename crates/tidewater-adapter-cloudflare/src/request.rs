use std::sync::Arc;

use crate::env::WorkerEnvSource;
use crate::response::{from_core_response, worker_internal_error};
use crate::CloudflareRequestContext;
use tidewater_core::adapter::guard;
use tidewater_core::bindings::{BindingSource, EnvBindings};
use tidewater_core::body::Body;
use tidewater_core::build::RequestHandler;
use tidewater_core::error::EdgeError;
use tidewater_core::http::{request_builder, Method as CoreMethod, Request, Uri};
use tidewater_core::manifest::ResolvedEnvironment;
use worker::{
    Context, Env, Error as WorkerError, Method, Request as CfRequest, Response as CfResponse,
};

pub async fn into_core_request(
    mut req: CfRequest,
    env: Env,
    ctx: Context,
) -> Result<Request, EdgeError> {
    let method = into_core_method(req.method());
    let url = req
        .url()
        .map_err(|err| EdgeError::bad_request(format!("invalid URL: {}", err)))?;
    let uri: Uri = url
        .as_str()
        .parse()
        .map_err(|err| EdgeError::bad_request(format!("invalid URI: {}", err)))?;

    let mut builder = request_builder().method(method).uri(uri);
    for (name, value) in req.headers().entries() {
        builder = builder.header(name.as_str(), value);
    }

    let bytes = req.bytes().await.map_err(EdgeError::internal)?;
    let mut request = builder
        .body(Body::from(bytes))
        .map_err(EdgeError::internal)?;

    CloudflareRequestContext::insert(&mut request, env, ctx);
    Ok(request)
}

/// Serve one invocation with bindings read from the worker environment.
pub async fn dispatch(
    handler: &RequestHandler,
    req: CfRequest,
    env: Env,
    ctx: Context,
    environment: &ResolvedEnvironment,
) -> Result<CfResponse, WorkerError> {
    let bindings = EnvBindings::from_source(&WorkerEnvSource::new(&env), environment);
    respond(handler, req, env, ctx, bindings).await
}

/// Like [`dispatch`], with bindings read from another source.
pub async fn dispatch_with_source(
    handler: &RequestHandler,
    req: CfRequest,
    env: Env,
    ctx: Context,
    source: &dyn BindingSource,
    environment: &ResolvedEnvironment,
) -> Result<CfResponse, WorkerError> {
    let bindings = EnvBindings::from_source(source, environment);
    respond(handler, req, env, ctx, bindings).await
}

async fn respond(
    handler: &RequestHandler,
    req: CfRequest,
    env: Env,
    ctx: Context,
    bindings: Result<EnvBindings, tidewater_core::bindings::BindingsError>,
) -> Result<CfResponse, WorkerError> {
    let response = guard(async move {
        let bindings = bindings.map_err(EdgeError::internal)?;
        let mut request = into_core_request(req, env, ctx).await?;
        request.extensions_mut().insert(Arc::new(bindings));
        handler.handle(request).await
    })
    .await;

    match from_core_response(response) {
        Ok(response) => Ok(response),
        Err(err) => {
            log::error!("worker error: {}", err);
            worker_internal_error()
        }
    }
}

fn into_core_method(method: Method) -> CoreMethod {
    CoreMethod::from_bytes(method.as_ref().as_bytes()).unwrap_or(CoreMethod::GET)
}
