//! Collection phase: walk every listing, fetch product pages for links not
//! yet stored, merge and persist one record at a time.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use tracing::{info, warn};

use crate::error::SkipReason;
use crate::model::{present, CatalogStub, DetailRecord, ProductRecord};
use crate::normalize::{canonical_link, derive_vendor_code};
use crate::progress::ProgressStore;
use crate::registry::Registry;
use crate::source::PageSource;

/// Random pause between product pages.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_ms: u64,
    max_ms: u64,
}

impl Pacing {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Pacing {
            min_ms,
            max_ms: max_ms.max(min_ms),
        }
    }

    async fn pause(&self) {
        if self.max_ms == 0 {
            return;
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Distinct product links found on the listings.
    pub discovered: usize,
    /// Links not yet in the progress store.
    pub new: usize,
    pub fetched: usize,
    pub skipped: usize,
}

pub struct Pipeline<'a, S> {
    source: S,
    registry: &'a Registry,
    store: &'a ProgressStore,
    pacing: Pacing,
}

impl<'a, S: PageSource> Pipeline<'a, S> {
    pub fn new(source: S, registry: &'a Registry, store: &'a ProgressStore, pacing: Pacing) -> Self {
        Pipeline {
            source,
            registry,
            store,
            pacing,
        }
    }

    /// Appends a record for every new product to `records`, saving the store
    /// after each one. Dropping the future leaves `records` holding everything
    /// merged so far.
    pub async fn collect(&self, records: &mut Vec<ProductRecord>) -> Result<RunSummary> {
        let stubs = self.discover().await;
        let seen: HashSet<String> = records
            .iter()
            .filter_map(|r| canonical_link(&r.link))
            .collect();
        let fresh: Vec<CatalogStub> = stubs
            .iter()
            .filter(|s| !seen.contains(&s.link))
            .cloned()
            .collect();

        let mut summary = RunSummary {
            discovered: stubs.len(),
            new: fresh.len(),
            ..Default::default()
        };
        info!("New products to fetch: {}", fresh.len());

        let pb = progress_bar(fresh.len())?;
        for (i, stub) in fresh.iter().enumerate() {
            info!("Product {}/{}: {}", i + 1, fresh.len(), stub.link);
            let merged = match self.source.detail(&stub.link).await {
                Some(detail) => merge(stub, detail, &self.registry.shop.brand_tag),
                None => Err(SkipReason::Unobtainable),
            };
            match merged {
                Ok(record) => {
                    info!(
                        vendor_code = %record.vendor_code,
                        price = %record.price,
                        "Fetched {}",
                        record.name
                    );
                    records.push(record);
                    self.store.save(records);
                    summary.fetched += 1;
                }
                Err(reason) => {
                    warn!(link = %stub.link, "Skipped: {}", reason);
                    summary.skipped += 1;
                }
            }
            pb.inc(1);
            self.pacing.pause().await;
        }
        pb.finish_and_clear();

        info!(
            "Collection done: {} discovered, {} new, {} fetched, {} skipped",
            summary.discovered, summary.new, summary.fetched, summary.skipped
        );
        Ok(summary)
    }

    /// Runs [`collect`](Self::collect) until it finishes or `interrupt`
    /// resolves, then saves whatever `records` holds. `None` means the run was
    /// interrupted.
    pub async fn collect_until<F: Future>(
        &self,
        records: &mut Vec<ProductRecord>,
        interrupt: F,
    ) -> Option<Result<RunSummary>> {
        let outcome = tokio::select! {
            res = self.collect(records) => Some(res),
            _ = interrupt => None,
        };
        if outcome.is_none() {
            warn!("Interrupted, saving {} products", records.len());
        }
        self.store.save(records);
        outcome
    }

    /// Stubs from every listing, one per canonical link, first occurrence kept.
    async fn discover(&self) -> Vec<CatalogStub> {
        let mut links = HashSet::new();
        let mut stubs = Vec::new();
        for filter in &self.registry.filters {
            for stub in self.source.catalog(filter).await {
                let Some(link) = canonical_link(&stub.link) else {
                    warn!(link = %stub.link, "Skipped: {}", SkipReason::RejectedLink);
                    continue;
                };
                if links.insert(link.clone()) {
                    stubs.push(CatalogStub { link, ..stub });
                }
            }
        }
        info!("Found {} products across all listings", stubs.len());
        stubs
    }
}

/// Saves `records` before handing back a failed `result`.
pub fn flush_on_error<T>(store: &ProgressStore, records: &[ProductRecord], result: Result<T>) -> Result<T> {
    if result.is_err() {
        store.save(records);
    }
    result
}

/// Record for one product. Listing values win for name, price, image and
/// volume when present; link and collection always come from the listing.
pub fn merge(stub: &CatalogStub, detail: DetailRecord, brand_tag: &str) -> Result<ProductRecord, SkipReason> {
    let pick = |catalog: &str, page: String| match present(catalog) {
        Some(v) => v.to_string(),
        None => page,
    };

    let name = pick(&stub.name, detail.name);
    if present(&name).is_none() {
        return Err(SkipReason::MissingName);
    }
    let price = match present(&stub.price).filter(|p| *p != "0") {
        Some(p) => p.to_string(),
        None => detail.price,
    };
    let vendor_code = present(&detail.vendor_code)
        .or_else(|| present(&stub.vendor_code))
        .map(str::to_string)
        .unwrap_or_else(|| derive_vendor_code(&name, &stub.link, brand_tag));

    Ok(ProductRecord {
        link: stub.link.clone(),
        vendor_code,
        price,
        image: pick(&stub.image, detail.image),
        volume: pick(&stub.volume, detail.volume),
        collection: stub.collection.clone(),
        additional_images: detail.additional_images,
        color: detail.color,
        material: detail.material,
        age: detail.age,
        size: detail.size,
        composition: detail.composition,
        handle: detail.handle,
        description: detail.description,
        name,
    })
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
            .progress_chars("=> "),
    );
    Ok(pb)
}
