//! Crate-wide constants.

/// Application directory name used under the platform config/data dirs.
pub const APP_NAME: &str = "envstore";

/// Environment variable overriding the settings file location.
pub const CONFIG_PATH_ENV: &str = "ENVSTORE_CONFIG";

/// Environment variable overriding the active build key version.
pub const BUILD_KEY_VERSION_ENV: &str = "ENVSTORE_BUILD_KEY_VERSION";

/// File name of the settings file inside the config directory.
pub const SETTINGS_FILENAME: &str = "settings.json";

/// Length of the full hex content hash (SHA-256).
pub const CONTENT_HASH_LEN: usize = 64;

/// Length of the content hash prefix embedded in version 2 build keys.
pub const SHORT_HASH_LEN: usize = 8;

/// Length of the opaque digest used as a version 3 build key.
pub const DIGEST_KEY_LEN: usize = 32;

/// Marker file whose presence identifies a managed environment directory.
pub const PREFIX_HISTORY_PATH: &str = "conda-meta/history";
