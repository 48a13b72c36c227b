use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_API_KEY";

/// Main configuration structure for recipe-muse
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used for recipe generation
    pub text_model: String,
    /// Model used to identify ingredients in a photo
    pub vision_model: String,
    pub image_model: String,
    pub image_size: String,
    pub temperature: f32,
    pub max_tokens: i32,
    /// How many recipes to ask for per run
    pub recipe_count: u8,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_total_seconds: u64,
    pub jitter_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub filter: String,
    pub ansi: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "recipe-muse".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            image_model: "dall-e-3".to_string(),
            image_size: "1024x1024".to_string(),
            temperature: 0.7,
            max_tokens: 2048,
            recipe_count: 3,
            request_timeout_seconds: 60,
        }
    }
}

// Automatic retries are opt-in: one attempt unless configured otherwise.
impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_delay_ms: 200,
            max_delay_ms: 30_000,
            max_total_seconds: 300,
            jitter_factor: 0.2,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "recipe_muse=info".to_string(),
            ansi: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// Always returns a usable config; problems are logged, not raised.
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("RECIPE_MUSE_CONFIG").unwrap_or_else(|_| "recipe-muse.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml_str(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides(|key| env::var(key).ok());

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    fn apply_env_overrides<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(api_key) = var("RECIPE_MUSE_API_KEY").or_else(|| var("OPENAI_API_KEY")) {
            self.service.api_key = api_key;
        }
        if let Some(base_url) = var("RECIPE_MUSE_BASE_URL") {
            self.service.base_url = base_url;
        }
        if let Some(model) = var("RECIPE_MUSE_TEXT_MODEL") {
            self.service.text_model = model;
        }
        if let Some(model) = var("RECIPE_MUSE_VISION_MODEL") {
            self.service.vision_model = model;
        }
        if let Some(model) = var("RECIPE_MUSE_IMAGE_MODEL") {
            self.service.image_model = model;
        }
        if let Some(size) = var("RECIPE_MUSE_IMAGE_SIZE") {
            self.service.image_size = size;
        }
        if let Some(count) = var("RECIPE_MUSE_RECIPE_COUNT") {
            if let Ok(count) = count.parse() {
                self.service.recipe_count = count;
            }
        }
        if let Some(timeout) = var("RECIPE_MUSE_TIMEOUT_SECONDS") {
            if let Ok(timeout) = timeout.parse() {
                self.service.request_timeout_seconds = timeout;
            }
        }
        if let Some(attempts) = var("RECIPE_MUSE_RETRY_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                self.retry.max_attempts = attempts;
            }
        }
        if let Some(filter) = var("RECIPE_MUSE_LOG") {
            self.logging.filter = filter;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.service.api_key()?;

        if !(1..=10).contains(&self.service.recipe_count) {
            anyhow::bail!("service.recipe_count must be between 1 and 10");
        }
        if !(0.0..=2.0).contains(&self.service.temperature) {
            anyhow::bail!("service.temperature must be between 0.0 and 2.0");
        }
        if self.service.request_timeout_seconds == 0 {
            anyhow::bail!("service.request_timeout_seconds cannot be 0");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            anyhow::bail!("retry.jitter_factor must be between 0.0 and 1.0");
        }

        Ok(())
    }
}

impl ServiceConfig {
    pub fn api_key(&self) -> anyhow::Result<String> {
        if self.api_key.trim().is_empty() || self.api_key == PLACEHOLDER_API_KEY {
            anyhow::bail!("RECIPE_MUSE_API_KEY or OPENAI_API_KEY must be set");
        }
        Ok(self.api_key.clone())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl RetryConfig {
    pub fn max_total_duration(&self) -> Duration {
        Duration::from_secs(self.max_total_seconds)
    }
}
