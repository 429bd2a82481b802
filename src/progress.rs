//! JSON file of already-scraped products, so an interrupted run can resume.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{present, ProductRecord};
use crate::normalize::canonical_link;

#[derive(Serialize)]
struct ProgressFile<'a> {
    products: &'a [ProductRecord],
}

#[derive(Deserialize)]
struct RawProgressFile {
    products: Vec<serde_json::Value>,
}

pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ProgressStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored records; an absent, unreadable or malformed file yields none.
    pub fn load(&self) -> Vec<ProductRecord> {
        if !self.path.exists() {
            info!("No progress file at {}, starting fresh", self.path.display());
            return Vec::new();
        }
        match self.try_load() {
            Ok(records) => {
                info!("Progress loaded: {} products", records.len());
                records
            }
            Err(e) => {
                warn!("Ignoring progress file {}: {:#}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<ProductRecord>> {
        let raw = std::fs::read_to_string(&self.path).context("read failed")?;
        let file: RawProgressFile =
            serde_json::from_str(&raw).context("expected an object with a `products` list")?;

        let mut records = Vec::with_capacity(file.products.len());
        for (i, value) in file.products.into_iter().enumerate() {
            match serde_json::from_value::<ProductRecord>(value) {
                Ok(r) => records.push(r),
                Err(e) => warn!("Skipping malformed progress entry #{}: {}", i, e),
            }
        }
        Ok(records)
    }

    /// Replaces the file with the valid, link-unique subset of `records`.
    ///
    /// Returns the number of records written, or `None` when writing failed.
    /// Failures are logged; the caller's records are never touched.
    pub fn save(&self, records: &[ProductRecord]) -> Option<usize> {
        let unique = prepare(records);
        match self.write(&unique) {
            Ok(()) => {
                info!("Progress saved: {} products", unique.len());
                Some(unique.len())
            }
            Err(e) => {
                warn!("Failed to save progress to {}: {:#}", self.path.display(), e);
                None
            }
        }
    }

    /// The previous file stays intact until the new one is fully on disk.
    fn write(&self, records: &[ProductRecord]) -> Result<()> {
        let staged = self.stage(records)?;
        if let Err(e) = std::fs::rename(&staged, &self.path) {
            let _ = std::fs::remove_file(&staged);
            return Err(e).with_context(|| format!("replace {}", self.path.display()));
        }
        Ok(())
    }

    fn stage(&self, records: &[ProductRecord]) -> Result<PathBuf> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&ProgressFile { products: records })?;
        let tmp = self.temp_path();
        let mut file =
            File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        Ok(tmp)
    }

    fn temp_path(&self) -> PathBuf {
        let mut s = self.path.as_os_str().to_owned();
        s.push(".tmp");
        PathBuf::from(s)
    }
}

/// Drops records without vendor code, name or usable link, rewrites links to
/// their canonical form and keeps the first record per link.
pub fn prepare(records: &[ProductRecord]) -> Vec<ProductRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| present(&r.vendor_code).is_some() && present(&r.name).is_some())
        .filter_map(|r| {
            let link = canonical_link(&r.link)?;
            if !seen.insert(link.clone()) {
                return None;
            }
            Some(ProductRecord { link, ..r.clone() })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_store(name: &str) -> ProgressStore {
        let mut dir = std::env::temp_dir();
        dir.push(format!("paomma_progress_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        ProgressStore::new(dir.join("progress.json"))
    }

    fn record(link: &str, code: &str) -> ProductRecord {
        ProductRecord {
            link: link.into(),
            name: format!("Товар {}", code),
            vendor_code: code.into(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_file_is_empty() {
        let store = tmp_store("missing");
        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_or_misshapen_file_is_empty() {
        let store = tmp_store("corrupt");
        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_empty());

        std::fs::write(store.path(), r#"[{"link": "a"}]"#).unwrap();
        assert!(store.load().is_empty());

        std::fs::write(store.path(), r#"{"products": 3}"#).unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn save_dedups_by_canonical_link() {
        let store = tmp_store("dedup");
        let records = vec![record("a#foo", "A1"), record("a", "A2"), record("b", "B1")];
        assert_eq!(store.save(&records), Some(2));

        let loaded = store.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].link, "a");
        assert_eq!(loaded[0].vendor_code, "A1");
        assert_eq!(loaded[1].link, "b");
    }

    #[test]
    fn save_drops_incomplete_and_listing_links() {
        let store = tmp_store("incomplete");
        let mut no_code = record("c", "");
        no_code.vendor_code.clear();
        let mut no_name = record("d", "D1");
        no_name.name.clear();
        let records = vec![
            no_code,
            no_name,
            record("#popup-buy", "E1"),
            record("https://paomma.ru/catalog/", "F1"),
            record("g", "G1"),
        ];
        assert_eq!(store.save(&records), Some(1));
        assert_eq!(store.load()[0].link, "g");
    }

    #[test]
    fn save_replaces_previous_content() {
        let store = tmp_store("replace");
        store.save(&[record("a", "A1"), record("b", "B1")]);
        store.save(&[record("c", "C1")]);
        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].link, "c");
    }

    #[test]
    fn unfinished_save_keeps_previous_file() {
        let store = tmp_store("staged");
        store.save(&[record("a", "A1")]);
        let staged = store.stage(&[record("b", "B1")]).unwrap();
        assert!(staged.exists());

        let loaded = store.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].link, "a");
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let store = tmp_store("no_temp");
        store.save(&[record("a", "A1")]);
        assert!(store.path().exists());
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn failed_save_is_reported_not_raised() {
        let store = tmp_store("unwritable");
        // A directory where the file should be makes the write fail.
        std::fs::create_dir_all(store.path()).unwrap();
        let records = vec![record("a", "A1")];
        assert_eq!(store.save(&records), None);
        assert_eq!(records.len(), 1);
    }
}
