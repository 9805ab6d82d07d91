//! Worker configuration with layered loading.
//!
//! Configuration is loaded via figment from three sources:
//!
//! 1. Environment variables (SCIOPS_*)
//! 2. TOML config file (if SCIOPS_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! The cache version is an injected constant: rotating it (and
//! redeploying) is the only supported way to invalidate the document set.

use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::rules::PersistRules;

mod validation;

pub use validation::ConfigError;

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SCIOPS_*)
/// 2. TOML config file (if SCIOPS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Name of the current cache namespace. Every other namespace found at
    /// activation is considered stale and purged.
    ///
    /// Set via SCIOPS_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Base URL the precache manifest paths resolve against.
    ///
    /// Set via SCIOPS_BASE_URL environment variable.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Root-relative paths written into the namespace at install time.
    ///
    /// Set via SCIOPS_PRECACHE_MANIFEST environment variable.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Domain fragments whose resources are persisted after a successful
    /// fetch (substring match against the full URL).
    ///
    /// Set via SCIOPS_PERSIST_DOMAINS environment variable.
    #[serde(default = "default_persist_domains")]
    pub persist_domains: Vec<String>,

    /// File extensions persisted after a successful fetch (path suffix
    /// match).
    ///
    /// Set via SCIOPS_PERSIST_EXTENSIONS environment variable.
    #[serde(default = "default_persist_extensions")]
    pub persist_extensions: Vec<String>,

    /// User-Agent string for network fetches.
    ///
    /// Set via SCIOPS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network fetch timeout in milliseconds.
    ///
    /// Set via SCIOPS_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects to follow per fetch.
    ///
    /// Set via SCIOPS_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_cache_version() -> String {
    "science-ops-v1".into()
}

fn default_base_url() -> String {
    "http://localhost:8080/".into()
}

fn default_precache_manifest() -> Vec<String> {
    vec!["./".into(), "./index.html".into()]
}

fn default_persist_domains() -> Vec<String> {
    vec!["sharepoint".into(), "environment.govt.nz".into()]
}

fn default_persist_extensions() -> Vec<String> {
    vec![".pdf".into()]
}

fn default_user_agent() -> String {
    "sciops-offline/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            base_url: default_base_url(),
            precache_manifest: default_precache_manifest(),
            persist_domains: default_persist_domains(),
            persist_extensions: default_persist_extensions(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl WorkerConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The cacheable-origin predicate configured for this worker.
    pub fn persist_rules(&self) -> PersistRules {
        PersistRules::new(self.persist_domains.clone(), self.persist_extensions.clone())
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SCIOPS_`
    /// 2. TOML file from `SCIOPS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation
    /// fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SCIOPS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SCIOPS_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
