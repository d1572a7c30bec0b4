use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CLASSIFIER_URL: &str = "https://twitter-api-1-cv0c.onrender.com";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_PORT: u16 = 8081;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
}

#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: Url,
    pub model: String,
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .finish()
    }
}

/// Settings read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier_url: Url,
    pub gemini: GeminiConfig,
    pub upstream_timeout: Duration,
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

/// Parse a base URL and make sure relative joins append to its path.
fn base_url(key: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn number<T: std::str::FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value }),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let classifier_url = base_url(
            "CLASSIFIER_API_URL",
            &non_empty("CLASSIFIER_API_URL").unwrap_or_else(|| DEFAULT_CLASSIFIER_URL.to_string()),
        )?;
        let gemini = GeminiConfig {
            api_key: non_empty("GEMINI_API_KEY"),
            base_url: base_url(
                "GEMINI_API_URL",
                &non_empty("GEMINI_API_URL").unwrap_or_else(|| DEFAULT_GEMINI_URL.to_string()),
            )?,
            model: non_empty("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        };

        let timeout_secs: u64 = number(
            "UPSTREAM_TIMEOUT_SECS",
            non_empty("UPSTREAM_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        )?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "UPSTREAM_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            classifier_url,
            gemini,
            upstream_timeout: Duration::from_secs(timeout_secs),
            port: number("PORT", non_empty("PORT"), DEFAULT_PORT)?,
            static_dir: non_empty("STATIC_DIR").map(PathBuf::from),
        })
    }

    pub fn log_summary(&self) {
        log::info!("Classification backend: {}", self.classifier_url);
        log::info!("Vision model: {} via {}", self.gemini.model, self.gemini.base_url);
        if self.gemini.api_key.is_none() {
            log::warn!(
                "GEMINI_API_KEY is not set; meme analysis relies on the endpoint authorising requests itself."
            );
        }
        match &self.static_dir {
            Some(dir) => log::info!("Serving console assets from {}", dir.display()),
            None => log::info!("STATIC_DIR not set; serving API routes only"),
        }
    }
}
