//! Error Boundary: the diagnostic page rendered when routing or rendering a request fails.

use std::any::Any;

use serde::Serialize;
use serde_json::{json, Value};

use crate::build::ServerMode;
use crate::document::{escape_text, Document, HeadView, PageHead, TEMPLATES};
use crate::error::EdgeError;

const ERROR_TITLE: &str = "Oh no!";
const DEFAULT_MESSAGE: &str = "Oops!";
const DEFAULT_DETAILS: &str = "An unexpected error occurred.";
const UNKNOWN_PANIC: &str = "request handler panicked";
const UNSERIALIZABLE: &str = "[unserializable value]";

/// Anything that is not a structured error, kept only for display.
#[derive(Clone, Debug, PartialEq)]
pub enum OpaqueFault {
    Text(String),
    Value(Value),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Fault {
    /// A recognised error: the message is the visible heading, the trace the detail.
    Structured { message: String, trace: String },
    Opaque(OpaqueFault),
}

impl Fault {
    pub fn structured(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self::Structured {
            message: message.into(),
            trace: trace.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Opaque(OpaqueFault::Text(text.into()))
    }

    /// Wrap an arbitrary value. Strings stay textual; anything that fails to serialise is
    /// replaced by a placeholder, so this never fails.
    pub fn opaque<T>(value: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        match serde_json::to_value(value) {
            Ok(Value::String(text)) => Self::text(text),
            Ok(value) => Self::Opaque(OpaqueFault::Value(value)),
            Err(_) => Self::text(UNSERIALIZABLE),
        }
    }

    pub fn from_edge_error(error: &EdgeError, mode: ServerMode) -> Self {
        match error.source_error() {
            Some(source) => {
                let trace = match mode {
                    ServerMode::Development => format!("{source:?}"),
                    ServerMode::Production | ServerMode::Test => source
                        .chain()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("\n    caused by: "),
                };
                Self::structured(source.to_string(), trace)
            }
            None => {
                let status = error.status();
                Self::Opaque(OpaqueFault::Value(json!({
                    "status": status.as_u16(),
                    "statusText": status.canonical_reason().unwrap_or_default(),
                    "internal": true,
                    "data": error.message(),
                })))
            }
        }
    }

    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        match panic_message(payload) {
            Some(message) => Self::text(message),
            None => Self::structured(UNKNOWN_PANIC, "panic payload of unknown type"),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured { .. })
    }

    fn diagnostic(&self) -> Diagnostic {
        match self {
            Self::Structured { message, trace } => Diagnostic {
                message: message.clone(),
                details: DEFAULT_DETAILS.to_string(),
                trace: if trace.is_empty() {
                    message.clone()
                } else {
                    trace.clone()
                },
            },
            Self::Opaque(opaque) => Diagnostic {
                message: DEFAULT_MESSAGE.to_string(),
                details: match opaque {
                    OpaqueFault::Text(text) => text.clone(),
                    OpaqueFault::Value(value) => value.to_string(),
                },
                trace: String::new(),
            },
        }
    }
}

impl From<&EdgeError> for Fault {
    fn from(error: &EdgeError) -> Self {
        Self::from_edge_error(error, ServerMode::default())
    }
}

#[derive(Serialize)]
struct Diagnostic {
    message: String,
    details: String,
    trace: String,
}

#[derive(Serialize)]
struct ErrorView<'a> {
    #[serde(flatten)]
    head: HeadView<'a>,
    #[serde(flatten)]
    diagnostic: Diagnostic,
}

/// Render the diagnostic page for `fault` inside the document's head and scripts.
pub fn render_error_page(document: &Document, fault: &Fault) -> String {
    let page = PageHead::default();
    let view = ErrorView {
        head: document.head_view(&page, Some(ERROR_TITLE)),
        diagnostic: fault.diagnostic(),
    };

    match TEMPLATES.render("error", &view) {
        Ok(html) => html,
        Err(err) => {
            log::error!("error page template failed: {err}");
            fallback_page(document.lang(), &view.diagnostic)
        }
    }
}

fn fallback_page(lang: &str, diagnostic: &Diagnostic) -> String {
    let mut details = String::new();
    if !diagnostic.trace.is_empty() {
        details.push_str(&format!(
            "<summary><strong>{}</strong></summary>",
            escape_text(&diagnostic.message)
        ));
    }
    details.push_str(&format!("<div>{}</div>", escape_text(&diagnostic.details)));
    if !diagnostic.trace.is_empty() {
        details.push_str(&format!("<div>{}</div>", escape_text(&diagnostic.trace)));
    }
    format!(
        "<!DOCTYPE html>\n<html lang=\"{}\"><head><meta charset=\"utf-8\"><title>{ERROR_TITLE}</title></head>\
         <body><main><h1>Something went wrong</h1><details>{details}</details></main></body></html>",
        escape_text(lang)
    )
}

/// Text of a `&str` or `String` panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{LinkDescriptor, MetaDescriptor};
    use anyhow::anyhow;

    fn document() -> Document {
        Document::new()
            .with_meta(MetaDescriptor::title("Seriously Fish"))
            .with_link(LinkDescriptor::stylesheet("/assets/app.css"))
            .with_script("/assets/entry.client.js")
    }

    #[test]
    fn structured_fault_shows_message_in_summary_and_trace() {
        let fault = Fault::structured("tank overflow", "at filter::pump (pump.rs:12)");
        let html = render_error_page(&document(), &fault);

        assert!(html.contains("<title>Oh no!</title>"));
        assert!(!html.contains("<title>Seriously Fish</title>"));
        assert!(html.contains("Something went wrong"));
        assert!(html.contains("<summary class=\"mb-2\"><strong>tank overflow</strong></summary>"));
        assert!(html.contains("<div>An unexpected error occurred.</div>"));
        assert!(html.contains("<div class=\"mt-2\">at filter::pump (pump.rs:12)</div>"));
    }

    #[test]
    fn text_fault_is_rendered_as_details_without_summary() {
        let html = render_error_page(&document(), &Fault::text("the heater is off"));
        assert!(html.contains("<div>the heater is off</div>"));
        assert!(!html.contains("<summary"));
        assert!(!html.contains("An unexpected error occurred."));
    }

    #[test]
    fn text_fault_markup_is_escaped() {
        let html = render_error_page(&document(), &Fault::text("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)"));
    }

    #[test]
    fn text_fault_without_markup_appears_verbatim() {
        let text = "depth=30cm `reef` tank, pH 8.2";
        let html = render_error_page(&document(), &Fault::text(text));
        assert!(html.contains(&format!("<div>{text}</div>")));

        let html = render_error_page(&document(), &Fault::structured("a=b", "trace `x`=1"));
        assert!(html.contains("<strong>a=b</strong>"));
        assert!(html.contains("<div class=\"mt-2\">trace `x`=1</div>"));
    }

    #[test]
    fn value_fault_renders_its_json_serialisation() {
        let fault = Fault::opaque(&json!({ "code": 42 }));
        assert_eq!(fault, Fault::Opaque(OpaqueFault::Value(json!({ "code": 42 }))));
        let html = render_error_page(&document(), &fault);
        assert!(html.contains("{&quot;code&quot;:42}"));
    }

    #[test]
    fn opaque_string_values_stay_textual() {
        assert_eq!(Fault::opaque("plain"), Fault::text("plain"));
        assert_eq!(Fault::opaque(&7_u8), Fault::Opaque(OpaqueFault::Value(json!(7))));
    }

    #[test]
    fn unserialisable_values_become_placeholder_text() {
        struct Broken;
        impl Serialize for Broken {
            fn serialize<S: serde::Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("no"))
            }
        }
        assert_eq!(Fault::opaque(&Broken), Fault::text(UNSERIALIZABLE));
    }

    #[test]
    fn error_page_keeps_document_head_and_scripts() {
        let html = render_error_page(&document(), &Fault::text("x"));
        assert!(html.contains("<link rel=\"stylesheet\" href=\"/assets/app.css\">"));
        assert!(html.contains("<script type=\"module\" src=\"/assets/entry.client.js\"></script>"));
        assert_eq!(html.matches("<head>").count(), 1);
        assert_eq!(html.matches("<body>").count(), 1);
    }

    #[test]
    fn internal_errors_are_structured_with_cause_chain() {
        let error = EdgeError::internal(anyhow!("connection refused").context("loading species"));
        match Fault::from_edge_error(&error, ServerMode::Production) {
            Fault::Structured { message, trace } => {
                assert_eq!(message, "loading species");
                assert!(trace.starts_with("loading species"));
                assert!(trace.contains("caused by: connection refused"));
            }
            other => panic!("unexpected fault: {other:?}"),
        }

        match Fault::from_edge_error(&error, ServerMode::Development) {
            Fault::Structured { trace, .. } => assert!(trace.contains("Caused by:")),
            other => panic!("unexpected fault: {other:?}"),
        }
    }

    #[test]
    fn route_errors_are_opaque_route_error_values() {
        let fault = Fault::from(&EdgeError::not_found("/species/unknown"));
        assert_eq!(
            fault,
            Fault::Opaque(OpaqueFault::Value(json!({
                "status": 404,
                "statusText": "Not Found",
                "internal": true,
                "data": "no route matched path: /species/unknown",
            })))
        );
    }

    #[test]
    fn panic_payloads_map_by_type() {
        let text: Box<dyn Any + Send> = Box::new("pump failure");
        assert_eq!(Fault::from_panic(text.as_ref()), Fault::text("pump failure"));

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned failure"));
        assert_eq!(Fault::from_panic(owned.as_ref()), Fault::text("owned failure"));

        let other: Box<dyn Any + Send> = Box::new(17_u32);
        assert!(Fault::from_panic(other.as_ref()).is_structured());
    }

    #[test]
    fn fallback_page_escapes_values() {
        let diagnostic = Fault::structured("<b>bad</b>", "trace").diagnostic();
        let html = fallback_page("en", &diagnostic);
        assert!(html.contains("<strong>&lt;b&gt;bad&lt;/b&gt;</strong>"));
        assert!(html.contains("<title>Oh no!</title>"));
    }
}
