use serde::{Deserialize, Serialize};

/// Colour value the product pages show when no colour option is selected.
pub const UNSPECIFIED_COLOR: &str = "Не указан";

/// One distinct product, keyed by its canonical `link`.
///
/// Field names follow the persisted progress file. Empty strings mean "absent",
/// which keeps files written by earlier runs loadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub link: String,
    pub name: String,
    #[serde(rename = "vendorCode")]
    pub vendor_code: String,
    /// Raw scraped price; coerced when the feed is assembled.
    pub price: String,
    pub image: String,
    #[serde(rename = "additional_images", alias = "additionalImages")]
    pub additional_images: Vec<String>,
    pub color: String,
    pub material: String,
    pub age: String,
    pub size: String,
    pub volume: String,
    pub composition: String,
    pub handle: String,
    pub description: String,
    pub collection: String,
}

impl ProductRecord {
    pub fn color(&self) -> Option<&str> {
        present(&self.color).filter(|c| *c != UNSPECIFIED_COLOR)
    }

    pub fn collection(&self) -> Option<&str> {
        present(&self.collection)
    }

    /// Identifier used in log lines.
    pub fn label(&self) -> &str {
        present(&self.name)
            .or_else(|| present(&self.link))
            .unwrap_or("unknown")
    }
}

/// Lightweight product data from a category listing page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStub {
    pub name: String,
    pub vendor_code: String,
    pub price: String,
    pub link: String,
    pub image: String,
    pub collection: String,
    pub volume: String,
}

/// Fields read from an individual product page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailRecord {
    pub name: String,
    pub vendor_code: String,
    pub price: String,
    pub image: String,
    pub additional_images: Vec<String>,
    pub color: String,
    pub material: String,
    pub age: String,
    pub size: String,
    pub volume: String,
    pub composition: String,
    pub handle: String,
    pub description: String,
}

/// `Some(trimmed)` for a non-blank value.
pub fn present(value: &str) -> Option<&str> {
    let v = value.trim();
    if v.is_empty() {
        None
    } else {
        Some(v)
    }
}
