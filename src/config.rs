use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-flash-lite-latest";
pub const DEFAULT_GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_UPDATE_TIMEOUT_SECS: u64 = 30;

const APP_DIR: &str = "spotlight";

/// Process configuration read from the environment once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Only consulted when the keyring holds no key.
    pub fallback_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_endpoint: String,
    pub request_timeout: Duration,
    pub update_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            fallback_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            update_timeout: Duration::from_secs(DEFAULT_UPDATE_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Load `.env` (or `../.env` when started from a nested dir) then read the environment.
    pub fn load() -> Self {
        if dotenvy::dotenv().is_err() {
            let parent_env = std::env::current_dir()
                .map(|p| p.join("../.env"))
                .unwrap_or_default();
            if dotenvy::from_path(&parent_env).is_ok() {
                log::info!("[config] loaded .env from {}", parent_env.display());
            }
        }
        Self::from_env()
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |key: &str, default: Duration| {
            non_empty(key)
                .and_then(|v| match v.parse::<u64>() {
                    Ok(0) | Err(_) => {
                        log::warn!("[config] ignoring invalid {key}={v}");
                        None
                    }
                    Ok(n) => Some(Duration::from_secs(n)),
                })
                .unwrap_or(default)
        };

        Self {
            fallback_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("SPOTLIGHT_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_endpoint: non_empty("SPOTLIGHT_GEMINI_ENDPOINT")
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or(defaults.gemini_endpoint),
            request_timeout: secs("SPOTLIGHT_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            update_timeout: secs("SPOTLIGHT_UPDATE_TIMEOUT_SECS", defaults.update_timeout),
        }
    }
}

/// Per-user data directory for settings and presets.
pub fn app_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::data_local_dir();

    base.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR)
}
