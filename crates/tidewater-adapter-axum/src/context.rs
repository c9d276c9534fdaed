use std::net::SocketAddr;

use tidewater_core::http::Request;

/// Connection details of a dev-server request, the local stand-in for the worker context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxumRequestContext {
    remote_addr: SocketAddr,
}

impl AxumRequestContext {
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self { remote_addr }
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub(crate) fn attach(self, request: &mut Request) {
        request.extensions_mut().insert(self);
    }

    pub fn get(request: &Request) -> Option<&AxumRequestContext> {
        request.extensions().get::<AxumRequestContext>()
    }
}
