//! `tidewater.toml`: application, document, environment and logging settings.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::LevelFilter;
use serde::{de, Deserialize, Deserializer};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::build::ServerMode;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest: {0}")]
    Io(#[from] io::Error),
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("manifest failed validation: {0}")]
    Invalid(#[from] ValidationErrors),
}

pub struct ManifestLoader {
    manifest: Arc<Manifest>,
}

impl ManifestLoader {
    /// Parse an embedded `tidewater.toml`. Adapters treat a failure here as a fault of the
    /// invocation, so this never panics.
    pub fn try_load_from_str(contents: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = toml::from_str(contents)?;
        manifest.validate()?;
        Ok(Self {
            manifest: Arc::new(manifest),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        Self::try_load_from_str(&std::fs::read_to_string(path)?)
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn shared(&self) -> Arc<Manifest> {
        Arc::clone(&self.manifest)
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct Manifest {
    #[serde(default)]
    #[validate(nested)]
    pub app: ManifestApp,
    #[serde(default)]
    #[validate(nested)]
    pub document: ManifestDocument,
    #[serde(default)]
    #[validate(nested)]
    pub environment: ManifestEnvironment,
    #[serde(default)]
    pub logging: ManifestLogging,
}

impl Manifest {
    pub fn mode(&self) -> ServerMode {
        self.app.mode.unwrap_or_default()
    }

    /// Logging settings for `adapter`: its own table, then the `[logging]` defaults.
    pub fn logging(&self, adapter: &str) -> LoggingSettings {
        let scoped = self
            .logging
            .adapters
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(adapter))
            .map(|(_, scoped)| scoped);

        LoggingSettings {
            level: scoped
                .and_then(|scoped| scoped.level)
                .or(self.logging.level)
                .unwrap_or(LevelFilter::Info),
            echo_stdout: scoped
                .and_then(|scoped| scoped.echo_stdout)
                .or(self.logging.echo_stdout)
                .unwrap_or(true),
        }
    }

    /// Binding declarations that apply to `adapter`, secrets ahead of variables.
    pub fn environment_for(&self, adapter: &str) -> ResolvedEnvironment {
        let secrets = self.environment.secrets.iter().map(|decl| (decl, true));
        let variables = self.environment.variables.iter().map(|decl| (decl, false));

        ResolvedEnvironment {
            bindings: secrets
                .chain(variables)
                .filter(|(decl, _)| decl.targets(adapter))
                .map(|(decl, secret)| ResolvedBinding {
                    name: decl.name.clone(),
                    key: decl.env.clone().unwrap_or_else(|| decl.name.clone()),
                    default: decl.value.clone(),
                    secret,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ManifestApp {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub entry: Option<String>,
    /// Render page markup on the server. `false` serves the bare shell for client rendering.
    #[serde(default = "default_true")]
    pub ssr: bool,
    #[serde(default)]
    pub mode: Option<ServerMode>,
}

impl Default for ManifestApp {
    fn default() -> Self {
        Self {
            name: None,
            entry: None,
            ssr: true,
            mode: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// `[document]` section: assets and options of the root HTML document.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestDocument {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub lang: Option<String>,
    #[serde(default)]
    pub stylesheets: Vec<String>,
    #[serde(default)]
    pub scripts: Vec<String>,
    #[serde(default)]
    pub scroll_restoration: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ManifestEnvironment {
    #[serde(default)]
    #[validate(nested)]
    pub variables: Vec<BindingDeclaration>,
    #[serde(default)]
    #[validate(nested)]
    pub secrets: Vec<BindingDeclaration>,
}

/// One `[[environment.variables]]` / `[[environment.secrets]]` entry.
#[derive(Debug, Deserialize, Validate)]
pub struct BindingDeclaration {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Adapters the declaration is limited to; empty means every adapter.
    #[serde(default)]
    pub adapters: Vec<String>,
    /// Runtime key to read instead of `name`.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub env: Option<String>,
    /// Used when the runtime leaves the key unset or empty.
    #[serde(default)]
    pub value: Option<String>,
}

impl BindingDeclaration {
    fn targets(&self, adapter: &str) -> bool {
        self.adapters.is_empty()
            || self
                .adapters
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(adapter))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedBinding {
    pub name: String,
    pub key: String,
    pub default: Option<String>,
    pub secret: bool,
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedEnvironment {
    bindings: Vec<ResolvedBinding>,
}

impl ResolvedEnvironment {
    /// First declaration for `name`; secrets are ordered ahead of variables.
    pub fn binding(&self, name: &str) -> Option<&ResolvedBinding> {
        self.bindings.iter().find(|binding| binding.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedBinding> {
        self.bindings.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// `[logging]` defaults plus `[logging.<adapter>]` tables.
#[derive(Debug, Default, Deserialize)]
pub struct ManifestLogging {
    #[serde(default, deserialize_with = "level_filter")]
    pub level: Option<LevelFilter>,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
    #[serde(flatten)]
    pub adapters: BTreeMap<String, AdapterLogging>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AdapterLogging {
    #[serde(default, deserialize_with = "level_filter")]
    pub level: Option<LevelFilter>,
    #[serde(default)]
    pub echo_stdout: Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub echo_stdout: bool,
}

fn level_filter<'de, D>(deserializer: D) -> Result<Option<LevelFilter>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|_| {
        de::Error::custom(format!(
            "logging level must be off, error, warn, info, debug or trace (got `{raw}`)"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"
[app]
name = "seriously-fish"
entry = "site/crates/seriously-fish-core"
mode = "development"

[document]
lang = "en"
stylesheets = ["/assets/app.css"]
scripts = ["/assets/entry.client.js"]
scroll-restoration = false

[[environment.variables]]
name = "SITE_URL"
value = "http://127.0.0.1:8787"
adapters = ["axum"]

[[environment.variables]]
name = "ENVIRONMENT"

[[environment.secrets]]
name = "SESSION_SECRET"
env = "LOCAL_SESSION_SECRET"

[logging]
level = "warn"

[logging.axum]
level = "Debug"
echo_stdout = false
"#;

    fn load(contents: &str) -> Arc<Manifest> {
        ManifestLoader::try_load_from_str(contents)
            .expect("manifest")
            .shared()
    }

    #[test]
    fn parses_app_and_document_sections() {
        let manifest = load(SAMPLE);
        assert_eq!(manifest.app.name.as_deref(), Some("seriously-fish"));
        assert!(manifest.app.ssr);
        assert_eq!(manifest.mode(), ServerMode::Development);
        assert_eq!(manifest.document.lang.as_deref(), Some("en"));
        assert_eq!(manifest.document.stylesheets, ["/assets/app.css"]);
        assert_eq!(manifest.document.scripts, ["/assets/entry.client.js"]);
        assert_eq!(manifest.document.scroll_restoration, Some(false));
    }

    #[test]
    fn empty_manifest_has_defaults() {
        let manifest = load("");
        assert!(manifest.app.name.is_none());
        assert!(manifest.app.ssr);
        assert_eq!(manifest.mode(), ServerMode::Production);
        assert!(manifest.document.scripts.is_empty());
        assert!(manifest.environment_for("axum").is_empty());
        assert_eq!(
            manifest.logging("axum"),
            LoggingSettings {
                level: LevelFilter::Info,
                echo_stdout: true,
            }
        );
    }

    #[test]
    fn ssr_can_be_disabled() {
        assert!(!load("[app]\nssr = false\n").app.ssr);
    }

    #[test]
    fn environment_is_filtered_per_adapter() {
        let manifest = load(SAMPLE);

        let axum = manifest.environment_for("AXUM");
        let names: Vec<&str> = axum.iter().map(|binding| binding.name.as_str()).collect();
        assert_eq!(names, ["SESSION_SECRET", "SITE_URL", "ENVIRONMENT"]);
        let site_url = axum.binding("SITE_URL").expect("site url");
        assert_eq!(site_url.default.as_deref(), Some("http://127.0.0.1:8787"));
        assert!(!site_url.secret);
        let session = axum.binding("SESSION_SECRET").expect("session secret");
        assert_eq!(session.key, "LOCAL_SESSION_SECRET");
        assert!(session.secret);

        let cloudflare = manifest.environment_for("cloudflare");
        assert!(cloudflare.binding("SITE_URL").is_none());
        assert_eq!(
            cloudflare.binding("ENVIRONMENT").map(|binding| binding.key.as_str()),
            Some("ENVIRONMENT")
        );
    }

    #[test]
    fn adapter_logging_falls_back_to_defaults() {
        let manifest = load(SAMPLE);
        assert_eq!(
            manifest.logging("axum"),
            LoggingSettings {
                level: LevelFilter::Debug,
                echo_stdout: false,
            }
        );
        assert_eq!(
            manifest.logging("cloudflare"),
            LoggingSettings {
                level: LevelFilter::Warn,
                echo_stdout: true,
            }
        );
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = ManifestLoader::try_load_from_str("app = [")
            .err()
            .expect("parse error");
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = ManifestLoader::try_load_from_str("[app]\nname = \"\"\n")
            .err()
            .expect("validation error");
        assert!(matches!(err, ManifestError::Invalid(_)));

        let err = ManifestLoader::try_load_from_str("[app]\nmode = \"staging\"\n")
            .err()
            .expect("unknown mode");
        assert!(matches!(err, ManifestError::Parse(_)));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let err = ManifestLoader::try_load_from_str("[logging.axum]\nlevel = \"loud\"\n")
            .err()
            .expect("bad level");
        assert!(err.to_string().contains("logging level must be"));
    }

    #[test]
    fn from_path_reads_files_and_reports_io_errors() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tidewater.toml");
        fs::write(&path, SAMPLE).unwrap();

        let loader = ManifestLoader::from_path(&path).expect("manifest");
        assert_eq!(loader.manifest().mode(), ServerMode::Development);

        let missing = dir.path().join("missing.toml");
        let err = ManifestLoader::from_path(&missing)
            .err()
            .expect("missing manifest");
        assert!(matches!(err, ManifestError::Io(ref source) if source.kind() == io::ErrorKind::NotFound));
    }
}
