/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Lookup behaviour
pub const DEFAULT_USE_DISPLAY_NAMES: bool = true;
pub const DEFAULT_RUNNING: bool = false;

// Timing
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// In-flight requests older than this may be re-issued
pub const DEFAULT_PENDING_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// Maximum time an unrefreshed cache entry is kept
pub const DEFAULT_MAX_UNREFRESHED: Duration = Duration::from_secs(20 * 60);
/// Expiry used when the service sends no usable Cache-Control
pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(60 * 60);

// Batch request sizing. Servers commonly cap URLs at 4096 chars.
pub const DEFAULT_URL_MAX_LENGTH: usize = 4096;
pub const DEFAULT_URL_SEND_THRESHOLD: usize = 3000;

// Environment
pub const ENV_PREFIX: &str = "AVATAR_NAMES_";
pub const DEFAULT_CONFIG_FILE: &str = "avatar-names.toml";
