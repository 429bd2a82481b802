use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::info;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Anything that can turn a URL into page HTML.
pub trait Fetch {
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// Rendered pages through spider.cloud.
pub struct SpiderFetcher {
    spider: Spider,
}

impl SpiderFetcher {
    pub fn new(api_key: String) -> Result<Self> {
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow!("Failed to create Spider client: {}", e))?;
        Ok(SpiderFetcher { spider })
    }
}

impl Fetch for SpiderFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Raw)),
            ..Default::default()
        };

        let response = self
            .spider
            .scrape_url(url, Some(params), "application/json")
            .await
            .map_err(|e| anyhow!("Spider scrape failed: {}", e))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };

        parsed
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("No content in spider response"))
    }
}

/// Plain HTTP fetch, for when no spider key is configured.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let html = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(html)
    }
}

pub enum Fetcher {
    Spider(SpiderFetcher),
    Http(HttpFetcher),
}

impl Fetcher {
    pub fn from_settings(api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        match api_key.filter(|k| !k.is_empty()) {
            Some(key) => {
                info!("Fetching pages through spider.cloud");
                Ok(Fetcher::Spider(SpiderFetcher::new(key.to_string())?))
            }
            None => {
                info!("No spider API key, fetching pages over plain HTTP");
                Ok(Fetcher::Http(HttpFetcher::new(timeout)?))
            }
        }
    }
}

impl Fetch for Fetcher {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        match self {
            Fetcher::Spider(f) => f.fetch_html(url).await,
            Fetcher::Http(f) => f.fetch_html(url).await,
        }
    }
}
