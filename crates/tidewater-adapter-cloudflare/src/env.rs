use tidewater_core::bindings::BindingSource;
use worker::Env;

/// [`BindingSource`] over the worker environment: secrets first, then plain vars.
pub struct WorkerEnvSource<'a> {
    env: &'a Env,
}

impl<'a> WorkerEnvSource<'a> {
    pub fn new(env: &'a Env) -> Self {
        Self { env }
    }
}

impl BindingSource for WorkerEnvSource<'_> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.env
            .secret(key)
            .map(|secret| secret.to_string())
            .or_else(|_| self.env.var(key).map(|var| var.to_string()))
            .ok()
    }

    fn has_bucket(&self, key: &str) -> bool {
        self.env.bucket(key).is_ok()
    }
}
