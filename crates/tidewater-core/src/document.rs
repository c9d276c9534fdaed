//! Document Shell: the outer HTML document every rendered page is composed into.
//!
//! The shell owns the `<head>` (charset, viewport, meta tags, links) and the tail of the
//! `<body>` (scroll restoration and client module scripts). Pages only contribute a body
//! fragment plus page-level meta and links, which override the root entries sharing the
//! same key.

use handlebars::Handlebars;
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::body::Body;
use crate::error::EdgeError;
use crate::http::{Response, StatusCode};
use crate::manifest::ManifestDocument;
use crate::response::{response_with_content_type, IntoResponse, TEXT_HTML};

const DEFAULT_LANG: &str = "en";

/// Restores the window scroll offset per path across reloads and history navigation.
const SCROLL_RESTORATION_SCRIPT: &str = concat!(
    "(function(){try{var k=\"tidewater-scroll:\"+location.pathname;",
    "var y=sessionStorage.getItem(k);if(y!==null){window.scrollTo(0,parseInt(y,10));}",
    "window.addEventListener(\"pagehide\",function(){sessionStorage.setItem(k,String(window.scrollY));});",
    "}catch(e){}})();"
);

pub(crate) static TEMPLATES: Lazy<Handlebars<'static>> = Lazy::new(|| {
    let mut hbs = Handlebars::new();
    hbs.register_escape_fn(escape_text);
    hbs.register_partial("head", include_str!("templates/head.hbs"))
        .expect("built-in head partial should parse");
    hbs.register_partial("scripts", include_str!("templates/scripts.hbs"))
        .expect("built-in scripts partial should parse");
    hbs.register_template_string("document", include_str!("templates/document.hbs"))
        .expect("built-in document template should parse");
    hbs.register_template_string("error", include_str!("templates/error.hbs"))
        .expect("built-in error template should parse");
    hbs
});

/// Escape text for HTML element content and double-quoted attributes. Everything
/// besides `& < > " '` is emitted as-is.
pub fn escape_text(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetaDescriptor {
    Title(String),
    Name { name: String, content: String },
    Property { property: String, content: String },
}

impl MetaDescriptor {
    pub fn title(title: impl Into<String>) -> Self {
        Self::Title(title.into())
    }

    pub fn name(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Name {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn property(property: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Property {
            property: property.into(),
            content: content.into(),
        }
    }

    fn same_key(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Title(_), Self::Title(_)) => true,
            (Self::Name { name: a, .. }, Self::Name { name: b, .. }) => a == b,
            (Self::Property { property: a, .. }, Self::Property { property: b, .. }) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkDescriptor {
    rel: String,
    href: String,
}

impl LinkDescriptor {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
        }
    }

    pub fn stylesheet(href: impl Into<String>) -> Self {
        Self::new("stylesheet", href)
    }

    pub fn canonical(href: impl Into<String>) -> Self {
        Self::new("canonical", href)
    }

    pub fn rel(&self) -> &str {
        &self.rel
    }

    pub fn href(&self) -> &str {
        &self.href
    }

    fn same_key(&self, other: &Self) -> bool {
        // Stylesheets stack; every other relation is unique per document.
        self.rel == other.rel && (self.rel != "stylesheet" || self.href == other.href)
    }
}

/// Page-level head entries carried on a page response until the shell composes it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageHead {
    pub meta: Vec<MetaDescriptor>,
    pub links: Vec<LinkDescriptor>,
}

/// Root HTML document configuration.
#[derive(Clone, Debug)]
pub struct Document {
    lang: String,
    meta: Vec<MetaDescriptor>,
    links: Vec<LinkDescriptor>,
    scripts: Vec<String>,
    scroll_restoration: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            lang: DEFAULT_LANG.to_string(),
            meta: Vec::new(),
            links: Vec::new(),
            scripts: Vec::new(),
            scroll_restoration: true,
        }
    }
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    #[must_use]
    pub fn with_meta(mut self, meta: MetaDescriptor) -> Self {
        self.meta.push(meta);
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: LinkDescriptor) -> Self {
        self.links.push(link);
        self
    }

    /// Add a client module script, loaded after the page content.
    #[must_use]
    pub fn with_script(mut self, src: impl Into<String>) -> Self {
        self.scripts.push(src.into());
        self
    }

    #[must_use]
    pub fn with_scroll_restoration(mut self, enabled: bool) -> Self {
        self.scroll_restoration = enabled;
        self
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn meta(&self) -> &[MetaDescriptor] {
        &self.meta
    }

    pub fn links(&self) -> &[LinkDescriptor] {
        &self.links
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    /// Layer the manifest's `[document]` section on top of the application defaults.
    pub fn apply_manifest(&mut self, config: &ManifestDocument) {
        if let Some(lang) = &config.lang {
            self.lang = lang.clone();
        }
        for href in &config.stylesheets {
            self.links.push(LinkDescriptor::stylesheet(href.clone()));
        }
        self.scripts.extend(config.scripts.iter().cloned());
        if let Some(enabled) = config.scroll_restoration {
            self.scroll_restoration = enabled;
        }
    }

    /// Compose a page body fragment into the full document.
    pub fn render(&self, markup: &str, page: &PageHead) -> Result<String, EdgeError> {
        let view = DocumentView {
            head: self.head_view(page, None),
            markup,
        };
        TEMPLATES
            .render("document", &view)
            .map_err(EdgeError::internal)
    }

    pub(crate) fn head_view<'a>(
        &'a self,
        page: &'a PageHead,
        title_override: Option<&'a str>,
    ) -> HeadView<'a> {
        let meta = merge(&self.meta, &page.meta, MetaDescriptor::same_key);
        let links = merge(&self.links, &page.links, LinkDescriptor::same_key);

        let mut title = title_override.map(str::to_string);
        let mut tags = Vec::new();
        for entry in meta {
            match entry {
                MetaDescriptor::Title(value) => {
                    title.get_or_insert(value);
                }
                MetaDescriptor::Name { name, content } => tags.push(MetaTagView {
                    name: Some(name),
                    property: None,
                    content,
                }),
                MetaDescriptor::Property { property, content } => tags.push(MetaTagView {
                    name: None,
                    property: Some(property),
                    content,
                }),
            }
        }

        HeadView {
            lang: &self.lang,
            title,
            meta: tags,
            links,
            scripts: &self.scripts,
            scroll_restoration: self.scroll_restoration,
            scroll_script: SCROLL_RESTORATION_SCRIPT,
        }
    }
}

fn merge<T: Clone>(root: &[T], page: &[T], same_key: fn(&T, &T) -> bool) -> Vec<T> {
    let mut merged = root.to_vec();
    for entry in page {
        match merged.iter_mut().find(|existing| same_key(existing, entry)) {
            Some(existing) => *existing = entry.clone(),
            None => merged.push(entry.clone()),
        }
    }
    merged
}

#[derive(Serialize)]
pub(crate) struct HeadView<'a> {
    lang: &'a str,
    title: Option<String>,
    meta: Vec<MetaTagView>,
    links: Vec<LinkDescriptor>,
    scripts: &'a [String],
    scroll_restoration: bool,
    scroll_script: &'static str,
}

#[derive(Serialize)]
struct MetaTagView {
    name: Option<String>,
    property: Option<String>,
    content: String,
}

#[derive(Serialize)]
struct DocumentView<'a> {
    #[serde(flatten)]
    head: HeadView<'a>,
    markup: &'a str,
}

/// Handler output rendered inside the Document Shell.
///
/// The markup is a body fragment; the request handler wraps it in the document after
/// routing, so handlers never deal with the `<head>` directly.
#[derive(Clone, Debug)]
pub struct Page {
    markup: String,
    head: PageHead,
    status: StatusCode,
}

impl Page {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            head: PageHead::default(),
            status: StatusCode::OK,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, meta: MetaDescriptor) -> Self {
        self.head.meta.push(meta);
        self
    }

    #[must_use]
    pub fn with_link(mut self, link: LinkDescriptor) -> Self {
        self.head.links.push(link);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    pub fn head(&self) -> &PageHead {
        &self.head
    }
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let mut response =
            response_with_content_type(self.status, Body::text(self.markup), TEXT_HTML);
        response.extensions_mut().insert(self.head);
        response
    }
}
