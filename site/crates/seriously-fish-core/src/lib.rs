mod app;
mod handlers;

pub use app::{build_router, root_document, App};
