use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

/// Runtime settings: built-in defaults overridden by `FEED_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub output_dir: PathBuf,
    pub progress_file: String,
    pub feed_file: String,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub pace_min_ms: u64,
    pub pace_max_ms: u64,
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub registry_file: Option<PathBuf>,
    #[serde(default)]
    pub spider_api_key: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut settings: Settings = Config::builder()
            .set_default("output_dir", "output")?
            .set_default("progress_file", "progress.json")?
            .set_default("feed_file", "paomma_catalog_price.xml")?
            .set_default("max_retries", 3_i64)?
            .set_default("retry_backoff_ms", 3000_i64)?
            .set_default("pace_min_ms", 1000_i64)?
            .set_default("pace_max_ms", 2500_i64)?
            .set_default("request_timeout_secs", 30_i64)?
            .add_source(Environment::with_prefix("FEED").try_parsing(true))
            .build()
            .context("Failed to build settings")?
            .try_deserialize()
            .context("Invalid FEED_* settings")?;

        if settings.spider_api_key.is_none() {
            settings.spider_api_key = std::env::var("SPIDER_API_KEY").ok();
        }
        if settings.pace_max_ms < settings.pace_min_ms {
            settings.pace_max_ms = settings.pace_min_ms;
        }
        Ok(settings)
    }

    pub fn progress_path(&self) -> PathBuf {
        self.output_dir.join(&self.progress_file)
    }

    pub fn feed_path(&self) -> PathBuf {
        self.output_dir.join(&self.feed_file)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
