use tidewater_core::app::Hooks;
use tidewater_core::document::{Document, MetaDescriptor};
use tidewater_core::middleware::RequestLogger;
use tidewater_core::router::RouterService;

use crate::handlers::{healthz, home};

pub(crate) const SITE_NAME: &str = "Seriously Fish";
pub(crate) const TITLE: &str = "Seriously Fish - Comprehensive Aquatic Life Database";
pub(crate) const DESCRIPTION: &str = "Comprehensive database of tropical fish, marine fish, \
aquatic plants, and freshwater invertebrates with detailed care guides and scientific information.";

pub struct App;

impl Hooks for App {
    fn routes() -> RouterService {
        build_router()
    }

    fn document() -> Document {
        root_document()
    }

    fn name() -> &'static str {
        SITE_NAME
    }
}

pub fn build_router() -> RouterService {
    RouterService::builder()
        .middleware(RequestLogger)
        .enable_route_listing()
        .get("/", home)
        .get("/healthz", healthz)
        .build()
}

/// Root layout: every page inherits this title and description unless it overrides them.
pub fn root_document() -> Document {
    Document::new()
        .with_meta(MetaDescriptor::title(TITLE))
        .with_meta(MetaDescriptor::name("description", DESCRIPTION))
}
