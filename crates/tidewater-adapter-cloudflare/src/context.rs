use std::future::Future;
use std::sync::Arc;

use tidewater_core::bindings::BucketBinding;
use tidewater_core::http::Request;
use worker::{Bucket, Context, Env};

/// Worker APIs stored alongside each request.
#[derive(Clone, Debug)]
pub struct CloudflareRequestContext {
    env: Arc<Env>,
    ctx: Arc<Context>,
}

impl CloudflareRequestContext {
    pub fn insert(request: &mut Request, env: Env, ctx: Context) {
        request.extensions_mut().insert(Self {
            env: Arc::new(env),
            ctx: Arc::new(ctx),
        });
    }

    pub fn get(request: &Request) -> Option<&CloudflareRequestContext> {
        request.extensions().get::<CloudflareRequestContext>()
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn ctx(&self) -> &Context {
        &self.ctx
    }

    /// R2 handle for a bucket resolved into the request's bindings.
    pub fn bucket(&self, binding: &BucketBinding) -> worker::Result<Bucket> {
        self.env.bucket(binding.name())
    }

    /// Keep the invocation alive until `task` finishes, after the response is sent.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.ctx.wait_until(task);
    }
}
