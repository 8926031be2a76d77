use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "pantry.toml",
    "config/pantry.toml",
    "crates/config/pantry.toml",
    "../pantry.toml",
    "../config/pantry.toml",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub live: LiveConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
}

/// Remote HTTP API settings. The base URL is the single value every other
/// endpoint (including the live socket) is derived from.
///
/// ```
/// use pantry_config::ApiConfig;
///
/// let api = ApiConfig::default();
/// assert_eq!(api.base_url, "http://localhost:8080/api");
/// assert_eq!(api.request_timeout_seconds, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "ApiConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    const fn default_request_timeout() -> u64 {
        30
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Full socket URL. When unset the URL is derived from `api.base_url`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "LiveConfig::default_endpoint_path")]
    pub endpoint_path: String,
    #[serde(default = "LiveConfig::default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl LiveConfig {
    fn default_endpoint_path() -> String {
        "/ws".to_string()
    }

    const fn default_connect_timeout() -> u64 {
        10
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: None,
            endpoint_path: Self::default_endpoint_path(),
            connect_timeout_seconds: Self::default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "pantry-session.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Re-fetch the user record during bootstrap when a session was restored.
    #[serde(default = "SessionConfig::enabled")]
    pub validate_on_startup: bool,
    /// Treat a 403 on an authenticated request as a dead session, like a 401.
    #[serde(default = "SessionConfig::enabled")]
    pub forbidden_ends_session: bool,
}

impl SessionConfig {
    const fn enabled() -> bool {
        true
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            validate_on_startup: true,
            forbidden_ends_session: true,
        }
    }
}

/// Load the client configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use pantry_config::load;
///
/// std::env::remove_var("PANTRY_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.api.base_url.is_empty());
/// ```
pub fn load() -> anyhow::Result<ClientConfig> {
    let defaults = ClientConfig::default();

    let request_timeout = i64::try_from(defaults.api.request_timeout_seconds).unwrap_or(i64::MAX);
    let connect_timeout =
        i64::try_from(defaults.live.connect_timeout_seconds).unwrap_or(i64::MAX);

    let mut builder = config::Config::builder()
        .set_default("api.base_url", defaults.api.base_url.clone())?
        .set_default("api.request_timeout_seconds", request_timeout)?
        .set_default("live.endpoint_path", defaults.live.endpoint_path.clone())?
        .set_default("live.connect_timeout_seconds", connect_timeout)?
        .set_default("storage.path", defaults.storage.path.clone())?
        .set_default(
            "session.validate_on_startup",
            defaults.session.validate_on_startup,
        )?
        .set_default(
            "session.forbidden_ends_session",
            defaults.session.forbidden_ends_session,
        )?;

    let environment_overrides = config::Environment::with_prefix("PANTRY").separator("__");

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var("PANTRY_CONFIG") {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via PANTRY_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(environment_overrides);

    let cfg = builder.build().context("unable to build configuration")?;

    let mut config = cfg
        .try_deserialize::<ClientConfig>()
        .context("invalid configuration")?;

    let trimmed = config.api.base_url.trim_end_matches('/').len();
    config.api.base_url.truncate(trimmed);

    if !config.live.endpoint_path.starts_with('/') {
        config.live.endpoint_path.insert(0, '/');
    }

    debug!(?config, "loaded client configuration");
    Ok(config)
}
