use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;

use crate::app::{App, Hooks};
use crate::body::Body;
use crate::boundary::{render_error_page, Fault};
use crate::document::{Document, PageHead};
use crate::error::EdgeError;
use crate::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, Request, Response, StatusCode,
};
use crate::manifest::Manifest;
use crate::response::{response_with_content_type, TEXT_HTML};

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServerMode {
    #[default]
    Production,
    Development,
    Test,
}

impl ServerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ServerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerMode {
    type Err = EdgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "development" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            other => Err(EdgeError::validation(format!(
                "server mode must be production, development, or test (got `{other}`)"
            ))),
        }
    }
}

/// Everything needed to serve requests: routes, root document, rendering options.
pub struct ServerBuild {
    pub app: App,
    pub document: Document,
    pub ssr: bool,
}

impl ServerBuild {
    pub fn new(app: App, document: Document) -> Self {
        Self {
            app,
            document,
            ssr: true,
        }
    }

    pub fn from_hooks<A: Hooks>(manifest: &Manifest) -> Self {
        let mut document = A::document();
        document.apply_manifest(&manifest.document);
        Self {
            app: A::build_app(),
            document,
            ssr: manifest.app.ssr,
        }
    }
}

pub fn create_request_handler(build: ServerBuild, mode: ServerMode) -> RequestHandler {
    RequestHandler {
        inner: Arc::new(HandlerInner { build, mode }),
    }
}

/// Per-request entry into the server build, shared across invocations.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<HandlerInner>,
}

struct HandlerInner {
    build: ServerBuild,
    mode: ServerMode,
}

impl RequestHandler {
    pub fn mode(&self) -> ServerMode {
        self.inner.mode
    }

    pub fn app(&self) -> &App {
        &self.inner.build.app
    }

    /// Route and render `request`.
    ///
    /// Handler errors and panics become the diagnostic error page. Only a failure to
    /// compose the document itself is returned as `Err`.
    pub async fn handle(&self, mut request: Request) -> Result<Response, EdgeError> {
        let inner = &self.inner;
        request.extensions_mut().insert(inner.mode);

        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let outcome = AssertUnwindSafe(inner.build.app.router().dispatch(request))
            .catch_unwind()
            .await;

        let (status, fault) = match outcome {
            Ok(Ok(response)) => return inner.compose(response),
            Ok(Err(err)) => {
                if err.is_route_error() {
                    log::info!("{} {} -> {}: {}", method, path, err.status().as_u16(), err);
                } else {
                    log::error!("{} {} failed: {:?}", method, path, err);
                }
                (err.status(), Fault::from_edge_error(&err, inner.mode))
            }
            Err(payload) => {
                let fault = Fault::from_panic(payload.as_ref());
                log::error!("{} {} panicked: {:?}", method, path, fault);
                (StatusCode::INTERNAL_SERVER_ERROR, fault)
            }
        };

        let html = render_error_page(&inner.build.document, &fault);
        Ok(response_with_content_type(status, Body::text(html), TEXT_HTML))
    }
}

impl HandlerInner {
    fn compose(&self, mut response: Response) -> Result<Response, EdgeError> {
        let Some(head) = response.extensions_mut().remove::<PageHead>() else {
            return Ok(response);
        };

        let markup = if self.build.ssr {
            let body = std::mem::take(response.body_mut());
            body.as_text().map(str::to_string).ok_or_else(|| {
                EdgeError::internal(anyhow::anyhow!("page markup must be buffered UTF-8"))
            })?
        } else {
            String::new()
        };

        let html = self.build.document.render(&markup, &head)?;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_HTML));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(html.len()));
        *response.body_mut() = Body::text(html);
        Ok(response)
    }
}
