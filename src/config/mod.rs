use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{NameCacheError, NameCacheResult};
use crate::utils::url::UrlUtils;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

/// Settings for the name cache and its HTTP transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameCacheConfig {
    /// Base URL of the batch lookup service, including the trailing slash.
    /// Absent means display-name lookups run in legacy mode.
    #[serde(default)]
    pub name_lookup_url: Option<String>,
    /// Manual override, lookups fall back to legacy names when false
    #[serde(default = "default_use_display_names")]
    pub use_display_names: bool,
    /// Start in running state instead of waiting for the first tick
    #[serde(default = "default_running")]
    pub running: bool,
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_pending_timeout", with = "duration_serde")]
    pub pending_timeout: Duration,
    #[serde(default = "default_max_unrefreshed", with = "duration_serde")]
    pub max_unrefreshed: Duration,
    #[serde(default = "default_expiry", with = "duration_serde")]
    pub default_expiry: Duration,
    /// A batch URL is sent once it grows past this many bytes
    #[serde(default = "default_url_send_threshold")]
    pub url_send_threshold: usize,
    #[serde(default = "default_url_max_length")]
    pub url_max_length: usize,
    /// Where the binary imports and exports the cache
    #[serde(default)]
    pub cache_file: Option<PathBuf>,
    /// JSON map of agent id to full name feeding the binary's legacy lookups
    #[serde(default)]
    pub legacy_names_file: Option<PathBuf>,
}

fn default_use_display_names() -> bool {
    DEFAULT_USE_DISPLAY_NAMES
}

fn default_running() -> bool {
    DEFAULT_RUNNING
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_pending_timeout() -> Duration {
    DEFAULT_PENDING_TIMEOUT
}

fn default_max_unrefreshed() -> Duration {
    DEFAULT_MAX_UNREFRESHED
}

fn default_expiry() -> Duration {
    DEFAULT_EXPIRY
}

fn default_url_send_threshold() -> usize {
    DEFAULT_URL_SEND_THRESHOLD
}

fn default_url_max_length() -> usize {
    DEFAULT_URL_MAX_LENGTH
}

impl Default for NameCacheConfig {
    fn default() -> Self {
        Self {
            name_lookup_url: None,
            use_display_names: default_use_display_names(),
            running: default_running(),
            request_timeout: default_request_timeout(),
            pending_timeout: default_pending_timeout(),
            max_unrefreshed: default_max_unrefreshed(),
            default_expiry: default_expiry(),
            url_send_threshold: default_url_send_threshold(),
            url_max_length: default_url_max_length(),
            cache_file: None,
            legacy_names_file: None,
        }
    }
}

impl NameCacheConfig {
    /// Load from defaults, the optional TOML file, then `AVATAR_NAMES_*` variables
    pub fn load(config_file: Option<&Path>) -> NameCacheResult<Self> {
        let path = config_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if path.exists() {
            info!("Loading configuration from: {}", path.display());
        } else {
            debug!("No configuration file at {}, using defaults", path.display());
        }

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the batch dispatcher cannot honour
    pub fn validate(&self) -> NameCacheResult<()> {
        if self.url_send_threshold == 0 {
            return Err(NameCacheError::configuration(
                "url_send_threshold must be greater than zero",
            ));
        }
        if self.url_send_threshold >= self.url_max_length {
            return Err(NameCacheError::configuration(format!(
                "url_send_threshold {} must be below url_max_length {}",
                self.url_send_threshold, self.url_max_length
            )));
        }
        // same normalization the cache applies, so scheme-less hosts pass
        if let Some(url) = self.lookup_url() {
            UrlUtils::normalize_lookup_base(url)?;
        }
        Ok(())
    }

    /// The configured lookup URL, treating an empty string as unset
    pub fn lookup_url(&self) -> Option<&str> {
        self.name_lookup_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
