//! Core primitives for server-rendered applications running on edge runtimes.

pub mod adapter;
pub mod app;
pub mod bindings;
pub mod body;
pub mod boundary;
pub mod build;
pub mod context;
pub mod document;
pub mod error;
pub mod handler;
pub mod http;
pub mod manifest;
pub mod middleware;
pub mod params;
pub mod response;
pub mod router;

#[cfg(test)]
pub(crate) mod test_logger;

pub use adapter::{guard, internal_server_error};
pub use app::{App, Hooks};
pub use build::{create_request_handler, RequestHandler, ServerBuild, ServerMode};
pub use document::{Document, LinkDescriptor, MetaDescriptor, Page};
pub use error::EdgeError;
