//! Environment bindings supplied by the hosting runtime to each invocation.
//!
//! Runtimes expose their environment through [`BindingSource`]; [`EnvBindings::from_source`]
//! reads the recognised keys once, validates them, and produces a read-only record that is
//! attached to the request as `Arc<EnvBindings>`.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use validator::ValidateUrl;

use crate::manifest::ResolvedEnvironment;

pub const IMAGES: &str = "IMAGES";
pub const SUPABASE_URL: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const SUPABASE_SERVICE_ROLE_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";
pub const SESSION_SECRET: &str = "SESSION_SECRET";
pub const ADMIN_EMAILS: &str = "ADMIN_EMAILS";
pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const ENVIRONMENT: &str = "ENVIRONMENT";
pub const SITE_URL: &str = "SITE_URL";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BindingsError {
    #[error("missing environment binding `{name}`")]
    Missing { name: String },
    #[error("invalid environment binding `{name}`: {reason}")]
    Invalid { name: String, reason: String },
}

impl BindingsError {
    fn missing(name: &str) -> Self {
        Self::Missing {
            name: name.to_string(),
        }
    }

    fn invalid(name: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Read access to a runtime's environment.
pub trait BindingSource {
    /// Plain variable or secret stored under `key`.
    fn lookup(&self, key: &str) -> Option<String>;

    /// Whether an object-storage bucket is bound under `key`.
    fn has_bucket(&self, key: &str) -> bool;
}

/// Process environment, used by the local development server. A bucket counts as bound
/// when a variable of the same name is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl BindingSource for ProcessEnv {
    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn has_bucket(&self, key: &str) -> bool {
        std::env::var_os(key).is_some()
    }
}

/// Values are variables; a key mapped to an empty string also counts as a bound bucket.
impl BindingSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn has_bucket(&self, key: &str) -> bool {
        self.contains_key(key)
    }
}

/// Credential that never appears in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

/// Name of a bound object-storage bucket. The handle itself is obtained through the
/// runtime adapter's request context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BucketBinding {
    name: String,
}

impl BucketBinding {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Administrator allow-list, matched case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdminEmails(Vec<String>);

impl AdminEmails {
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(',')
                .map(|email| email.trim().to_ascii_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, email: &str) -> bool {
        let email = email.trim();
        self.0
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(email))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

#[derive(Clone, Debug)]
pub struct EnvBindings {
    images: BucketBinding,
    supabase_url: String,
    supabase_anon_key: String,
    supabase_service_role_key: Secret,
    session_secret: Secret,
    admin_emails: AdminEmails,
    discord_webhook_url: Option<String>,
    environment: String,
    site_url: String,
}

impl EnvBindings {
    pub fn from_source(
        source: &dyn BindingSource,
        environment: &ResolvedEnvironment,
    ) -> Result<Self, BindingsError> {
        let reader = Reader {
            source,
            environment,
        };

        let discord_webhook_url = match reader.optional(DISCORD_WEBHOOK_URL) {
            Some(url) => Some(check_url(DISCORD_WEBHOOK_URL, url)?),
            None => None,
        };

        Ok(Self {
            images: reader.bucket(IMAGES)?,
            supabase_url: reader.url(SUPABASE_URL)?,
            supabase_anon_key: reader.required(SUPABASE_ANON_KEY)?,
            supabase_service_role_key: Secret(reader.required(SUPABASE_SERVICE_ROLE_KEY)?),
            session_secret: Secret(reader.required(SESSION_SECRET)?),
            admin_emails: AdminEmails::parse(&reader.required(ADMIN_EMAILS)?),
            discord_webhook_url,
            environment: reader.required(ENVIRONMENT)?,
            site_url: reader.url(SITE_URL)?.trim_end_matches('/').to_string(),
        })
    }

    pub fn images(&self) -> &BucketBinding {
        &self.images
    }

    pub fn supabase_url(&self) -> &str {
        &self.supabase_url
    }

    pub fn supabase_anon_key(&self) -> &str {
        &self.supabase_anon_key
    }

    pub fn supabase_service_role_key(&self) -> &Secret {
        &self.supabase_service_role_key
    }

    pub fn session_secret(&self) -> &Secret {
        &self.session_secret
    }

    pub fn admin_emails(&self) -> &AdminEmails {
        &self.admin_emails
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.admin_emails.contains(email)
    }

    pub fn discord_webhook_url(&self) -> Option<&str> {
        self.discord_webhook_url.as_deref()
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Public site URL without a trailing slash.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }
}

struct Reader<'a> {
    source: &'a dyn BindingSource,
    environment: &'a ResolvedEnvironment,
}

impl Reader<'_> {
    fn key<'k>(&'k self, name: &'k str) -> &'k str {
        self.environment
            .binding(name)
            .map(|binding| binding.key.as_str())
            .unwrap_or(name)
    }

    // Only an absent key falls back to the manifest default.
    fn lookup(&self, name: &str) -> Option<String> {
        self.source.lookup(self.key(name)).or_else(|| {
            self.environment
                .binding(name)
                .and_then(|binding| binding.default.clone())
        })
    }

    // Blank values count as unset.
    fn optional(&self, name: &str) -> Option<String> {
        self.lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    // Present values pass through unchanged, including empty ones.
    fn required(&self, name: &str) -> Result<String, BindingsError> {
        self.lookup(name)
            .ok_or_else(|| BindingsError::missing(name))
    }

    fn url(&self, name: &str) -> Result<String, BindingsError> {
        check_url(name, self.required(name)?)
    }

    // A declared default value stands in for a runtime bucket, for local development.
    fn bucket(&self, name: &str) -> Result<BucketBinding, BindingsError> {
        let key = self.key(name);
        let declared = self
            .environment
            .binding(name)
            .and_then(|binding| binding.default.as_deref())
            .is_some_and(|value| !value.trim().is_empty());
        if declared || self.source.has_bucket(key) {
            Ok(BucketBinding {
                name: key.to_string(),
            })
        } else {
            Err(BindingsError::missing(name))
        }
    }
}

fn check_url(name: &str, value: String) -> Result<String, BindingsError> {
    if !value.validate_url() {
        return Err(BindingsError::invalid(name, format!("`{value}` is not a URL")));
    }
    if !(value.starts_with("https://") || value.starts_with("http://")) {
        return Err(BindingsError::invalid(name, "expected an http(s) URL"));
    }
    Ok(value)
}
