use std::net::{SocketAddr, TcpListener as StdTcpListener};

use anyhow::Context;
use axum::Router;
use log::LevelFilter;
use simple_logger::SimpleLogger;
use tokio::runtime::Builder as RuntimeBuilder;
use tokio::signal;
use tower::{service_fn, Service};

use tidewater_core::app::Hooks;
use tidewater_core::build::{create_request_handler, ServerBuild};
use tidewater_core::manifest::ManifestLoader;

use crate::service::TidewaterAxumService;
use crate::ADAPTER;

/// Configuration used when running the local dev server.
#[derive(Clone)]
pub struct AxumDevServerConfig {
    pub addr: SocketAddr,
    pub enable_ctrl_c: bool,
}

impl Default for AxumDevServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8787)),
            enable_ctrl_c: true,
        }
    }
}

/// Blocking dev server serving one [`TidewaterAxumService`].
pub struct AxumDevServer {
    service: TidewaterAxumService,
    config: AxumDevServerConfig,
}

impl AxumDevServer {
    pub fn new(service: TidewaterAxumService) -> Self {
        Self::with_config(service, AxumDevServerConfig::default())
    }

    pub fn with_config(service: TidewaterAxumService, config: AxumDevServerConfig) -> Self {
        Self { service, config }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to build tokio runtime")?;

        runtime.block_on(self.run_async())
    }

    async fn run_async(self) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;

        let listener = StdTcpListener::bind(config.addr)
            .with_context(|| format!("failed to bind dev server to {}", config.addr))?;
        listener
            .set_nonblocking(true)
            .context("failed to set listener to non-blocking")?;
        let listener = tokio::net::TcpListener::from_std(listener)
            .context("failed to adopt std listener into tokio")?;

        log::info!("serving on http://{}", config.addr);
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }

    #[cfg(test)]
    async fn run_with_listener(self, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
        let AxumDevServer { service, config } = self;
        serve_with_listener(service, listener, config.enable_ctrl_c).await
    }
}

async fn serve_with_listener(
    service: TidewaterAxumService,
    listener: tokio::net::TcpListener,
    enable_ctrl_c: bool,
) -> anyhow::Result<()> {
    let router = Router::new().fallback_service(service_fn(move |req| {
        let mut svc = service.clone();
        async move { svc.call(req).await }
    }));
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, make_service);
    if enable_ctrl_c {
        server
            .with_graceful_shutdown(async {
                let _ = signal::ctrl_c().await;
            })
            .await
            .context("axum server error")?;
    } else {
        server.await.context("axum server error")?;
    }

    Ok(())
}

/// Load the manifest, initialise logging, and serve the application until ctrl-c.
pub fn run_app<A: Hooks>(manifest_src: &str) -> anyhow::Result<()> {
    let loader = ManifestLoader::try_load_from_str(manifest_src).context("invalid manifest")?;
    let manifest = loader.manifest();
    let logging = manifest.logging(ADAPTER);
    let level = if logging.echo_stdout {
        logging.level
    } else {
        LevelFilter::Off
    };
    SimpleLogger::new().with_level(level).init().ok();

    let handler = create_request_handler(ServerBuild::from_hooks::<A>(manifest), manifest.mode());
    let service = TidewaterAxumService::new(handler)
        .with_environment(manifest.environment_for(ADAPTER));

    AxumDevServer::new(service).run()
}
