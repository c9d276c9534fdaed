use crate::document::Document;
use crate::router::RouterService;

const DEFAULT_APP_NAME: &str = "Tidewater App";

/// Router plus display name, produced by [`Hooks::build_app`].
pub struct App {
    router: RouterService,
    name: String,
}

impl App {
    pub fn new(router: RouterService) -> Self {
        Self::with_name(router, DEFAULT_APP_NAME)
    }

    pub fn with_name<S>(router: RouterService, name: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            router,
            name: name.into(),
        }
    }

    pub fn router(&self) -> &RouterService {
        &self.router
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S>(&mut self, name: S)
    where
        S: Into<String>,
    {
        self.name = name.into();
    }

    pub fn default_name() -> &'static str {
        DEFAULT_APP_NAME
    }
}

/// Entry points an application implements so runtime adapters can build it.
pub trait Hooks {
    /// Route table of the application.
    fn routes() -> RouterService;

    /// Root document every page is rendered into: language, root meta tags, assets.
    /// Manifest `[document]` settings are layered on top of it.
    fn document() -> Document {
        Document::default()
    }

    fn name() -> &'static str {
        App::default_name()
    }

    /// Adjust the freshly built application. No-op by default.
    fn configure(_app: &mut App) {}

    fn build_app() -> App
    where
        Self: Sized,
    {
        let mut app = App::with_name(Self::routes(), Self::name());
        Self::configure(&mut app);
        app
    }
}
