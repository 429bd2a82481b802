//! Static lookup data for one shop: collections, listing pages, keyword rules
//! and translation tables.
//!
//! A `Registry` is built once at startup and handed to every component by
//! reference. The built-in tables describe paomma.ru; a JSON file with the same
//! shape can replace them.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub name: String,
    pub company: String,
    pub url: String,
    pub platform: String,
    pub currency: String,
    /// Prefix of generated vendor codes.
    pub brand_tag: String,
    /// Closing fragment of every offer's sales notes.
    pub notice: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub key: String,
    pub name: String,
    pub external_id: String,
}

/// One category listing page walked by the catalog extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogFilter {
    pub name: String,
    pub url: String,
    pub collection: String,
}

/// `keywords` are matched as lower-case substrings; any hit yields `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub result: String,
    /// Vendor code assigned when a matched record has none.
    #[serde(default)]
    pub vendor_code: Option<String>,
}

impl KeywordRule {
    fn new(keywords: &[&str], result: &str) -> Self {
        KeywordRule {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            result: result.to_string(),
            vendor_code: None,
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
    }
}

/// First rule matching `text`, in list order.
pub fn first_match<'a>(rules: &'a [KeywordRule], text: &str) -> Option<&'a KeywordRule> {
    rules.iter().find(|r| r.matches(text))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registry {
    pub shop: Shop,
    pub collections: Vec<Collection>,
    pub filters: Vec<CatalogFilter>,
    pub category_rules: Vec<KeywordRule>,
    pub default_category: String,
    pub collection_rules: Vec<KeywordRule>,
    /// Generic product labels keyed by URL path fragment (or name fragment).
    pub name_fallbacks: Vec<KeywordRule>,
    pub colors: BTreeMap<String, String>,
    pub collection_blurbs: BTreeMap<String, String>,
}

impl Registry {
    /// Built-in tables, or the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry {}", path.display()))?;
        let registry: Registry = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed registry {}", path.display()))?;
        info!(
            "Registry loaded from {}: {} collections, {} filters",
            path.display(),
            registry.collections.len(),
            registry.filters.len()
        );
        Ok(registry)
    }

    pub fn collection(&self, key: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.key == key)
    }

    pub fn category_for(&self, name: &str) -> &str {
        first_match(&self.category_rules, name)
            .map(|r| r.result.as_str())
            .unwrap_or(&self.default_category)
    }

    /// Listing page of a collection, if one of the filters walks it.
    pub fn collection_url(&self, key: &str) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| f.collection == key)
            .map(|f| f.url.trim())
    }

    pub fn collection_blurb(&self, key: &str) -> String {
        if let Some(text) = self.collection_blurbs.get(key) {
            return text.clone();
        }
        let name = self
            .collection(key)
            .map(|c| c.name.as_str())
            .unwrap_or("Товары");
        format!("Коллекция: {}", name)
    }
}

impl Default for Registry {
    fn default() -> Self {
        let collections = [
            ("poilniki", "Поильники", "952113747654"),
            ("prorezyvateli", "Прорезыватели", "206682998845"),
            ("soski", "Соски", "169064286158"),
            ("pustyshki", "Пустышки", "897379413064"),
            ("derzhateli", "Держатели", "41033353415"),
            ("futlyary", "Футляры", "571209369666"),
            ("smesi", "Контейнеры для смеси", "952891154747"),
            ("molokootsosy", "Молокоотсосы", "918219204990"),
            ("butylochki", "Бутылочки и молокоотсос", "876147046474"),
        ]
        .into_iter()
        .map(|(key, name, id)| Collection {
            key: key.into(),
            name: name.into(),
            external_id: id.into(),
        })
        .collect();

        let filters = [
            ("Поильники", "poilniki", "poilniki"),
            ("Прорезыватели", "prorezyvateli", "prorezyvateli"),
            ("Соски", "antikolikovye-soski", "soski"),
            ("Пустышки", "pustyshki", "pustyshki"),
            ("Держатели", "derzhateli-dlya-pustyshek", "derzhateli"),
            ("Футляры", "konteyner-dlya-pustyshek", "futlyary"),
            ("Контейнеры для смеси", "konteynery-dlya-smesi", "smesi"),
            ("Бутылочки и молокоотсос", "butylochki-dlya-kormleniya", "butylochki"),
            ("Молокоотсосы", "molokootsos", "molokootsosy"),
        ]
        .into_iter()
        .map(|(name, path, collection)| CatalogFilter {
            name: name.into(),
            url: format!("https://paomma.ru/catalog/{}", path),
            collection: collection.into(),
        })
        .collect();

        let category_rules = vec![
            KeywordRule::new(&["поильник"], "952113747654"),
            KeywordRule::new(&["прорезыватель"], "206682998845"),
            KeywordRule::new(&["соска"], "169064286158"),
            KeywordRule::new(&["пустышка"], "897379413064"),
            KeywordRule::new(&["держатель"], "41033353415"),
            KeywordRule::new(&["футляр", "контейнер для пустышек"], "571209369666"),
            KeywordRule::new(&["смеси"], "952891154747"),
            KeywordRule::new(&["молокоотсос"], "918219204990"),
        ];

        let collection_rules = vec![KeywordRule {
            vendor_code: Some("MOLOKOOSC_001".into()),
            ..KeywordRule::new(&["молокоотсос"], "molokootsosy")
        }];

        let name_fallbacks = vec![
            KeywordRule::new(&["/molokootsos"], "Молокоотсос электрический беспроводной"),
            KeywordRule::new(&["/antikolikovye-soski"], "Антиколиковая соска для бутылочки"),
            KeywordRule::new(&["/pustyshki"], "Пустышка для новорождённых"),
            KeywordRule::new(&["/prorezyvateli"], "Прорезыватель для детей"),
            KeywordRule::new(&["/poilniki"], "Поильник для детей"),
            KeywordRule::new(&["silikonovyy-chehol", "chehol"], "Силиконовый чехол для бутылочки"),
        ];

        let colors = [
            ("Light grey", "Светло-серый"),
            ("Taupe", "Тауп"),
            ("Sage", "Шалфей"),
            ("Zephyr", "Зефир"),
            ("Buttercream", "Сливочный"),
            ("Almond milk", "Молоко миндаля"),
            ("Navy", "Темно-синий"),
            ("Mushroom", "Грибной"),
            ("Black", "Черный"),
            ("Hazelnut", "Лесной орех"),
            ("Cream", "Кремовый"),
            ("Beige", "Бежевый"),
            ("Pink", "Розовый"),
            ("Grey", "Серый"),
        ]
        .into_iter()
        .map(|(en, ru)| (en.to_string(), ru.to_string()))
        .collect();

        let collection_blurbs = [
            ("poilniki", "Поильники Paomma с защитой от протекания, силиконовой ручкой и антисорбционным клапаном. Подходят для детей от 6 месяцев. Без БФА и фталатов."),
            ("prorezyvateli", "Прорезыватели Paomma из 100% пищевого силикона. Анатомическая форма, мягкие текстуры, безопасные красители. Помогают при прорезывании зубов."),
            ("soski", "Соски для бутылочек Paomma с антиколиковой системой, потоками S/M/L. Из 100% пищевого силикона. Подходят для новорождённых."),
            ("pustyshki", "Пустышки Paomma из силикона и латекса. Анатомическая форма, вентиляционные отверстия, гипоаллергенный материал. Подходят с рождения."),
            ("derzhateli", "Держатели для пустышек Paomma с безопасным замком, регулируемой длиной. Из гипоаллергенных материалов. Не теряются."),
            ("futlyary", "Футляры для пустышек Paomma герметичные, компактные. Защищают от загрязнений. Удобны в поездках."),
            ("smesi", "Контейнеры для смеси Paomma с герметичными отсеками, маркировкой. Удобны для хранения и транспортировки."),
            ("molokootsosy", "Молокоотсосы Paomma с эргономичным дизайном, мягкими вставками. Безопасны для кожи. Эффективны и комфортны."),
            ("butylochki", "Бутылочки Paomma с антиколиковой системой, широким горлышком. Из полипропилена. Без БФА. Подходят с рождения."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Registry {
            shop: Shop {
                name: "Paomma".into(),
                company: "Paomma".into(),
                url: "https://paomma.ru".into(),
                platform: "Tilda".into(),
                currency: "RUB".into(),
                brand_tag: "PAO".into(),
                notice: "Официальный сайт Paomma".into(),
            },
            collections,
            filters,
            category_rules,
            default_category: "876147046474".into(),
            collection_rules,
            name_fallbacks,
            colors,
            collection_blurbs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_rules_first_match_wins() {
        let r = Registry::default();
        assert_eq!(r.category_for("Поильник с трубочкой"), "952113747654");
        assert_eq!(r.category_for("ФУТЛЯР для пустышки"), "571209369666");
        assert_eq!(r.category_for("Контейнер для пустышек"), "571209369666");
        // "пустышка" precedes "держатель" in the rule list
        assert_eq!(r.category_for("Держатель, пустышка"), "897379413064");
        assert_eq!(r.category_for("Стеклянная бутылочка"), "876147046474");
    }

    #[test]
    fn every_collection_has_a_listing_page() {
        let r = Registry::default();
        for c in &r.collections {
            assert!(r.collection_url(&c.key).is_some(), "{}", c.key);
        }
        assert_eq!(r.collection_url("unknown"), None);
    }

    #[test]
    fn blurb_falls_back_to_collection_name() {
        let mut r = Registry::default();
        r.collection_blurbs.remove("smesi");
        assert_eq!(r.collection_blurb("smesi"), "Коллекция: Контейнеры для смеси");
        assert_eq!(r.collection_blurb("nope"), "Коллекция: Товары");
    }

    #[test]
    fn registry_round_trips_through_json_file() {
        let mut path = std::env::temp_dir();
        path.push("paomma_feed_registry.json");
        let mut r = Registry::default();
        r.shop.name = "Other".into();
        std::fs::write(&path, serde_json::to_string(&r).unwrap()).unwrap();

        let loaded = Registry::load(Some(&path)).unwrap();
        assert_eq!(loaded.shop.name, "Other");
        assert_eq!(loaded.collections, r.collections);
        let _ = std::fs::remove_file(&path);
    }
}
