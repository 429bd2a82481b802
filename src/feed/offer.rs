use std::collections::HashSet;

use crate::error::SkipReason;
use crate::model::{present, ProductRecord};
use crate::normalize::{clean_color, color_token, normalize_color};
use crate::registry::Registry;

use super::description::build_description;

/// One `<offer>` of the feed, with text fields still unescaped.
#[derive(Debug, Clone, PartialEq)]
pub struct Offer {
    pub id: String,
    pub name: String,
    pub vendor_code: String,
    pub price: i64,
    pub category_id: String,
    pub url: String,
    pub pictures: Vec<String>,
    pub params: Vec<(&'static str, String)>,
    pub collection: Option<String>,
    pub description: String,
    pub sales_notes: String,
}

/// Offer ids handed out during one feed generation.
#[derive(Debug, Default)]
pub struct OfferIds {
    used: HashSet<String>,
}

impl OfferIds {
    /// `<vendor code>[_<colour token>]`, suffixed `_1`, `_2`, ... until unused.
    pub fn assign(&mut self, vendor_code: &str, color: Option<&str>) -> String {
        let token = color.map(color_token).unwrap_or_default();
        let base = if token.is_empty() {
            vendor_code.to_string()
        } else {
            format!("{}_{}", vendor_code, token)
        };

        let mut id = base.clone();
        let mut suffix = 1;
        while self.used.contains(&id) {
            id = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        self.used.insert(id.clone());
        id
    }
}

/// Feeds never carry a zero or negative price.
pub fn coerce_price(raw: &str) -> i64 {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|p| *p > 0)
        .unwrap_or(1)
}

pub fn build_offer(
    record: &ProductRecord,
    registry: &Registry,
    ids: &mut OfferIds,
) -> Result<Offer, SkipReason> {
    let vendor_code = present(&record.vendor_code).ok_or(SkipReason::MissingVendorCode)?;
    let name = present(&record.name).ok_or(SkipReason::MissingName)?;
    let url = present(&record.link).ok_or(SkipReason::RejectedLink)?;

    let color = record.color().map(|c| normalize_color(clean_color(c), &registry.colors));
    let id = ids.assign(vendor_code, record.color());

    let image = present(&record.image);
    let mut pictures: Vec<String> = image.map(str::to_string).into_iter().collect();
    pictures.extend(
        record
            .additional_images
            .iter()
            .filter_map(|img| present(img))
            .filter(|img| Some(*img) != image)
            .map(str::to_string),
    );

    let mut params = Vec::new();
    if let Some(c) = &color {
        params.push(("Цвет", c.clone()));
    }
    for (label, value) in [
        ("Размер", &record.size),
        ("Объём", &record.volume),
        ("Материал", &record.material),
        ("Возраст", &record.age),
        ("Ручки", &record.handle),
        ("Состав", &record.composition),
    ] {
        if let Some(v) = present(value) {
            params.push((label, v.to_string()));
        }
    }

    let collection = record
        .collection()
        .filter(|key| registry.collection(key).is_some())
        .map(str::to_string);

    Ok(Offer {
        id,
        name: name.to_string(),
        vendor_code: vendor_code.to_string(),
        price: coerce_price(&record.price),
        category_id: registry.category_for(name).to_string(),
        url: url.to_string(),
        pictures,
        params,
        collection,
        description: build_description(record, &registry.shop.name),
        sales_notes: sales_notes(record, color.as_deref(), &registry.shop.notice),
    })
}

fn sales_notes(record: &ProductRecord, color: Option<&str>, notice: &str) -> String {
    let mut parts = Vec::new();
    if let Some(c) = color {
        parts.push(format!("Цвет: {}", c));
    }
    for (label, value) in [
        ("Объём", &record.volume),
        ("Возраст", &record.age),
        ("Материал", &record.material),
    ] {
        if let Some(v) = present(value) {
            parts.push(format!("{}: {}", label, v));
        }
    }
    parts.push(notice.to_string());
    format!("{}.", parts.join(". "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> ProductRecord {
        ProductRecord {
            link: format!("https://paomma.ru/p/{}", code),
            name: "Поильник".into(),
            vendor_code: code.into(),
            price: "250".into(),
            ..Default::default()
        }
    }

    #[test]
    fn price_floor() {
        for raw in ["0", "-5", "", "abc", " 12.5 "] {
            assert_eq!(coerce_price(raw), 1, "{:?}", raw);
        }
        assert_eq!(coerce_price("250"), 250);
        assert_eq!(coerce_price(" 465 "), 465);
    }

    #[test]
    fn colliding_ids_get_suffixes() {
        let mut ids = OfferIds::default();
        assert_eq!(ids.assign("X", None), "X");
        assert_eq!(ids.assign("X", None), "X_1");
        assert_eq!(ids.assign("X", None), "X_2");
        assert_eq!(ids.assign("X", Some("Light grey")), "X_lightgrey");
        assert_eq!(ids.assign("X", Some("Light grey:2")), "X_lightgrey_1");
        // Cyrillic colours contribute no token.
        assert_eq!(ids.assign("Y", Some("Розовый")), "Y");
    }

    #[test]
    fn offer_fields() {
        let registry = Registry::default();
        let mut ids = OfferIds::default();
        let mut r = record("PAO_1");
        r.color = "Sage".into();
        r.volume = "240 мл".into();
        r.image = "https://img/1.jpg".into();
        r.additional_images = vec!["https://img/1.jpg".into(), "https://img/2.jpg".into()];
        r.collection = "poilniki".into();

        let offer = build_offer(&r, &registry, &mut ids).unwrap();
        assert_eq!(offer.id, "PAO_1_sage");
        assert_eq!(offer.price, 250);
        assert_eq!(offer.category_id, "952113747654");
        assert_eq!(offer.pictures, vec!["https://img/1.jpg", "https://img/2.jpg"]);
        assert_eq!(offer.params[0], ("Цвет", "Sage (Шалфей)".to_string()));
        assert!(offer.params.contains(&("Объём", "240 мл".to_string())));
        assert_eq!(offer.collection.as_deref(), Some("poilniki"));
        assert_eq!(
            offer.sales_notes,
            "Цвет: Sage (Шалфей). Объём: 240 мл. Официальный сайт Paomma."
        );
    }

    #[test]
    fn unknown_colour_and_collection_are_dropped() {
        let registry = Registry::default();
        let mut ids = OfferIds::default();
        let mut r = record("PAO_2");
        r.color = "Не указан".into();
        r.collection = "elsewhere".into();

        let offer = build_offer(&r, &registry, &mut ids).unwrap();
        assert_eq!(offer.id, "PAO_2");
        assert!(offer.params.is_empty());
        assert_eq!(offer.collection, None);
        assert_eq!(offer.sales_notes, "Официальный сайт Paomma.");
    }

    #[test]
    fn incomplete_records_are_skipped() {
        let registry = Registry::default();
        let mut ids = OfferIds::default();
        let mut no_code = record("");
        no_code.vendor_code.clear();
        assert_eq!(
            build_offer(&no_code, &registry, &mut ids),
            Err(SkipReason::MissingVendorCode)
        );
        let mut no_name = record("A");
        no_name.name = "  ".into();
        assert_eq!(build_offer(&no_name, &registry, &mut ids), Err(SkipReason::MissingName));
    }
}
