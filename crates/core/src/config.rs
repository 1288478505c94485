use std::time::Duration;

use serde::Deserialize;

/// Root application configuration. Loaded from an optional
/// `campaign-console.toml` file and environment variables with the prefix
/// `CAMPAIGN_CONSOLE__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
}

/// Backend REST endpoint. Every client is constructed from this value; there
/// is no process-wide base URL.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_list_timeout_ms")]
    pub list_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentationConfig {
    /// Reject field/operator pairs outside the capability table at save time.
    /// When off, incompatible pairs are left for the evaluator to reject.
    #[serde(default)]
    pub strict_operators: bool,
}

// Default functions
fn default_base_url() -> String {
    "http://localhost:5000/api".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_list_timeout_ms() -> u64 {
    5_000
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
            list_timeout_ms: default_list_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_millis(self.list_timeout_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl TrackerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            tracker: TrackerConfig::default(),
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional config file and environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("campaign-console").required(false))
            .add_source(
                config::Environment::with_prefix("CAMPAIGN_CONSOLE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
