//! Adapter helpers for Cloudflare Workers.

mod logger;

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod context;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod env;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod request;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
mod response;

pub use logger::init_logger;

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use context::CloudflareRequestContext;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use env::WorkerEnvSource;
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use request::{dispatch, dispatch_with_source, into_core_request};
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub use response::{from_core_response, worker_internal_error};

/// Adapter name used for `[logging.<adapter>]` and `[environment]` filters.
pub const ADAPTER: &str = "cloudflare";

#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub async fn run_app<A: tidewater_core::app::Hooks>(
    req: worker::Request,
    env: worker::Env,
    ctx: worker::Context,
) -> Result<worker::Response, worker::Error> {
    run_app_with_manifest::<A>("", req, env, ctx).await
}

/// Serve one invocation using the embedded `tidewater.toml`:
///
/// ```rust,ignore
/// run_app_with_manifest::<App>(include_str!("../../../tidewater.toml"), req, env, ctx).await
/// ```
///
/// A manifest that fails to load yields the generic 500 response.
#[cfg(all(feature = "cloudflare", target_arch = "wasm32"))]
pub async fn run_app_with_manifest<A: tidewater_core::app::Hooks>(
    manifest_src: &str,
    req: worker::Request,
    env: worker::Env,
    ctx: worker::Context,
) -> Result<worker::Response, worker::Error> {
    use tidewater_core::build::{create_request_handler, ServerBuild};
    use tidewater_core::manifest::ManifestLoader;

    let loader = match ManifestLoader::try_load_from_str(manifest_src) {
        Ok(loader) => loader,
        Err(err) => {
            init_logger(log::LevelFilter::Info);
            log::error!("worker error: {}", err);
            return worker_internal_error();
        }
    };
    let manifest = loader.manifest();
    init_logger(manifest.logging(ADAPTER).level);

    let handler = create_request_handler(ServerBuild::from_hooks::<A>(manifest), manifest.mode());
    let environment = manifest.environment_for(ADAPTER);
    dispatch(&handler, req, env, ctx, &environment).await
}
