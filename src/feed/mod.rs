pub mod description;
pub mod offer;
pub mod writer;
pub mod xml;

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tracing::{info, warn};

use crate::error::{FeedError, SkipReason};
use crate::model::{present, ProductRecord};
use crate::registry::Registry;

use offer::{build_offer, OfferIds};

/// A rendered feed plus what went into it.
#[derive(Debug)]
pub struct FeedDocument {
    pub xml: String,
    pub offers: usize,
    pub skipped: Vec<(String, SkipReason)>,
}

pub struct FeedAssembler<'a> {
    registry: &'a Registry,
}

impl<'a> FeedAssembler<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        FeedAssembler { registry }
    }

    /// Builds the whole feed from the accumulated records. Records that cannot
    /// become offers are logged and skipped; offer ids are unique within this
    /// call only.
    pub fn assemble(
        &self,
        records: &[ProductRecord],
        generated_at: DateTime<Local>,
    ) -> Result<FeedDocument, FeedError> {
        info!("Generating feed from {} products", records.len());

        let mut ids = OfferIds::default();
        let mut offers = Vec::with_capacity(records.len());
        let mut skipped = Vec::new();
        for record in records {
            match build_offer(record, self.registry, &mut ids) {
                Ok(o) => offers.push(o),
                Err(reason) => {
                    warn!("Skipping offer for {}: {}", record.label(), reason);
                    skipped.push((record.label().to_string(), reason));
                }
            }
        }

        let pictures = self.collection_pictures(records);
        let date = generated_at.format("%Y-%m-%d %H:%M").to_string();
        let xml = xml::render(self.registry, &offers, &pictures, &date)?;

        info!("Feed assembled: {} offers, {} skipped", offers.len(), skipped.len());
        Ok(FeedDocument {
            xml,
            offers: offers.len(),
            skipped,
        })
    }

    /// First product image per collection, in registry order.
    pub fn collection_pictures(&self, records: &[ProductRecord]) -> HashMap<String, String> {
        self.registry
            .collections
            .iter()
            .filter_map(|c| {
                records
                    .iter()
                    .filter(|r| r.collection() == Some(c.key.as_str()))
                    .find_map(|r| present(&r.image))
                    .map(|img| (c.key.clone(), img.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 19, 12, 30, 0).unwrap()
    }

    fn record(code: &str, name: &str, price: &str) -> ProductRecord {
        ProductRecord {
            link: format!("https://paomma.ru/catalog/p/{}", code),
            name: name.into(),
            vendor_code: code.into(),
            price: price.into(),
            ..Default::default()
        }
    }

    #[test]
    fn document_has_every_section() {
        let registry = Registry::default();
        let mut r = record("PAO_1", "Поильник <мини> & ко", "465");
        r.collection = "poilniki".into();
        r.image = "https://img/p1.jpg".into();
        r.description = "Особенности. Не протекает".into();

        let doc = FeedAssembler::new(&registry).assemble(&[r], at()).unwrap();
        let xml = &doc.xml;
        assert_eq!(doc.offers, 1);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<yml_catalog date=\"2026-10-19 12:30\">"));
        assert!(xml.contains("<name>Paomma</name>"));
        assert!(xml.contains("<currency id=\"RUB\" rate=\"1\"/>"));
        assert!(xml.contains("<category id=\"952113747654\">Поильники</category>"));
        assert!(xml.contains("<offer id=\"PAO_1\" available=\"true\">"));
        assert!(xml.contains("<name>Поильник &lt;мини&gt; &amp; ко</name>"));
        assert!(xml.contains("<price>465</price>"));
        assert!(xml.contains("<categoryId>952113747654</categoryId>"));
        assert!(xml.contains("<![CDATA[https://paomma.ru/catalog/p/PAO_1]]>"));
        assert!(xml.contains("<collectionId>poilniki</collectionId>"));
        assert!(xml.contains("<description>Особенности: Не протекает.</description>"));
        assert!(xml.contains("<collection id=\"poilniki\">"));
        assert!(xml.contains("<picture>https://img/p1.jpg</picture>"));
        assert!(xml.contains("<![CDATA[https://paomma.ru/catalog/poilniki]]>"));
        assert!(xml.trim_end().ends_with("</yml_catalog>"));
        assert!(writer::validate(xml, "Paomma").is_ok());
    }

    #[test]
    fn price_floor_in_offers() {
        let registry = Registry::default();
        let records: Vec<_> = ["0", "-5", "", "abc", "250"]
            .iter()
            .enumerate()
            .map(|(i, p)| record(&format!("C{}", i), "Соска", p))
            .collect();
        let doc = FeedAssembler::new(&registry).assemble(&records, at()).unwrap();
        assert_eq!(doc.xml.matches("<price>1</price>").count(), 4);
        assert_eq!(doc.xml.matches("<price>250</price>").count(), 1);
    }

    #[test]
    fn shared_vendor_codes_get_distinct_ids() {
        let registry = Registry::default();
        let records = vec![
            ProductRecord {
                link: "https://paomma.ru/a".into(),
                ..record("X", "Соска", "10")
            },
            ProductRecord {
                link: "https://paomma.ru/b".into(),
                ..record("X", "Соска", "10")
            },
        ];
        let doc = FeedAssembler::new(&registry).assemble(&records, at()).unwrap();
        assert!(doc.xml.contains("<offer id=\"X\" available=\"true\">"));
        assert!(doc.xml.contains("<offer id=\"X_1\" available=\"true\">"));

        // A fresh generation pass starts over.
        let again = FeedAssembler::new(&registry).assemble(&records[..1], at()).unwrap();
        assert!(again.xml.contains("<offer id=\"X\" available=\"true\">"));
    }

    #[test]
    fn bad_records_do_not_abort_the_feed() {
        let registry = Registry::default();
        let records = vec![
            record("", "Без артикула", "10"),
            record("OK", "Пустышка", "10"),
        ];
        let doc = FeedAssembler::new(&registry).assemble(&records, at()).unwrap();
        assert_eq!(doc.offers, 1);
        assert_eq!(doc.skipped, vec![("Без артикула".to_string(), SkipReason::MissingVendorCode)]);
    }

    #[test]
    fn collection_picture_is_first_image_found() {
        let registry = Registry::default();
        let mut a = record("A", "Соска", "1");
        a.collection = "soski".into();
        let mut b = record("B", "Соска", "1");
        b.collection = "soski".into();
        b.image = "https://img/b.jpg".into();
        let mut c = record("C", "Соска", "1");
        c.collection = "soski".into();
        c.image = "https://img/c.jpg".into();

        let pictures = FeedAssembler::new(&registry).collection_pictures(&[a, b, c]);
        assert_eq!(pictures.get("soski").map(String::as_str), Some("https://img/b.jpg"));
        assert!(!pictures.contains_key("poilniki"));
    }

    #[test]
    fn shop_name_with_markup_characters_validates() {
        let mut registry = Registry::default();
        registry.shop.name = "Mama & Baby".into();
        let doc = FeedAssembler::new(&registry).assemble(&[], at()).unwrap();
        assert!(doc.xml.contains("<name>Mama &amp; Baby</name>"));
        assert!(writer::validate(&doc.xml, &registry.shop.name).is_ok());
    }

    #[test]
    fn empty_record_set_still_validates() {
        let registry = Registry::default();
        let doc = FeedAssembler::new(&registry).assemble(&[], at()).unwrap();
        assert_eq!(doc.offers, 0);
        assert!(writer::validate(&doc.xml, &registry.shop.name).is_ok());
    }
}
