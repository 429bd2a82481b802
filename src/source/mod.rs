//! The page source: fetches listing and product pages and turns them into
//! stubs and detail records.

pub mod catalog;
pub mod detail;
pub mod fetch;

use std::time::Duration;

use scraper::ElementRef;
use tracing::{info, warn};

use crate::model::{CatalogStub, DetailRecord};
use crate::registry::{CatalogFilter, Registry};

use fetch::Fetch;

/// What the pipeline needs from a page source.
pub trait PageSource {
    /// Product stubs of one listing page; empty when the page is unobtainable.
    async fn catalog(&self, filter: &CatalogFilter) -> Vec<CatalogStub>;
    /// Product page fields, or `None` once retries are exhausted or the page
    /// carries no product.
    async fn detail(&self, url: &str) -> Option<DetailRecord>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

pub struct HtmlSource<'a, F> {
    fetcher: F,
    registry: &'a Registry,
    retry: RetryPolicy,
}

impl<'a, F: Fetch> HtmlSource<'a, F> {
    pub fn new(fetcher: F, registry: &'a Registry, retry: RetryPolicy) -> Self {
        HtmlSource {
            fetcher,
            registry,
            retry,
        }
    }

    async fn fetch_with_retry(&self, url: &str) -> Option<String> {
        let attempts = self.retry.attempts.max(1);
        for attempt in 1..=attempts {
            info!("Opening {}", url);
            match self.fetcher.fetch_html(url).await {
                Ok(html) => return Some(html),
                Err(e) => {
                    warn!("Fetch failed for {} (attempt {}/{}): {:#}", url, attempt, attempts, e);
                    if attempt < attempts {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }
        None
    }
}

impl<F: Fetch> PageSource for HtmlSource<'_, F> {
    async fn catalog(&self, filter: &CatalogFilter) -> Vec<CatalogStub> {
        info!("Walking listing {} ({})", filter.name, filter.url);
        let Some(html) = self.fetch_with_retry(&filter.url).await else {
            warn!("Listing {} unobtainable, skipped", filter.name);
            return Vec::new();
        };
        let stubs = catalog::parse_catalog(&html, filter, self.registry);
        info!("Found {} products in {}", stubs.len(), filter.name);
        stubs
    }

    async fn detail(&self, url: &str) -> Option<DetailRecord> {
        let html = self.fetch_with_retry(url).await?;
        let detail = detail::parse_detail(&html, url, self.registry);
        if detail.is_none() {
            warn!("Skipped {}: no product name", url);
        }
        detail
    }
}

const BLOCK_TAGS: &[&str] = &["p", "div", "li", "ul", "ol", "tr", "h1", "h2", "h3", "h4", "section"];

/// Approximates the browser's `innerText`: block elements and `<br>` start new
/// lines, blank lines are dropped.
pub(crate) fn inner_text(el: ElementRef) -> String {
    let mut out = String::new();
    push_text(el, &mut out);
    out.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(el: ElementRef, out: &mut String) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            let name = child_el.value().name();
            if name == "br" {
                out.push('\n');
                continue;
            }
            let block = BLOCK_TAGS.contains(&name);
            if block {
                out.push('\n');
            }
            push_text(child_el, out);
            if block {
                out.push('\n');
            }
        }
    }
}

/// Image URL of an `<img>` or lazy-loaded element.
pub(crate) fn image_url(el: ElementRef) -> Option<String> {
    ["data-original", "src"]
        .iter()
        .filter_map(|a| el.value().attr(a))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// First run of digits in `text`.
pub(crate) fn first_digits(text: &str) -> Option<String> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}
