use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;
use tidewater_core::context::RequestContext;
use tidewater_core::document::{LinkDescriptor, Page};
use tidewater_core::error::EdgeError;
use tidewater_core::response::Text;

use crate::app::{DESCRIPTION, SITE_NAME};

static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut registry = Handlebars::new();
    registry
        .register_template_string("home", include_str!("templates/home.hbs"))
        .expect("home template");
    registry
});

#[derive(Serialize)]
struct HomeView<'a> {
    name: &'a str,
    tagline: &'a str,
    environment: Option<&'a str>,
}

pub(crate) async fn home(ctx: RequestContext) -> Result<Page, EdgeError> {
    let bindings = ctx.bindings();
    let view = HomeView {
        name: SITE_NAME,
        tagline: DESCRIPTION,
        environment: bindings
            .as_deref()
            .filter(|bindings| !bindings.is_production())
            .map(|bindings| bindings.environment()),
    };
    let markup = TEMPLATES.render("home", &view).map_err(EdgeError::internal)?;

    let mut page = Page::new(markup);
    if let Some(bindings) = bindings {
        page = page.with_link(LinkDescriptor::canonical(format!("{}/", bindings.site_url())));
    }
    Ok(page)
}

pub(crate) async fn healthz(_ctx: RequestContext) -> Result<Text<&'static str>, EdgeError> {
    Ok(Text::new("ok"))
}
