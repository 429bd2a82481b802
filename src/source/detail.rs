use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::model::{DetailRecord, UNSPECIFIED_COLOR};
use crate::normalize::{
    clean_color, extract_age, extract_composition, extract_dimensions, infer_name_from_heuristics,
    volume_from_url,
};
use crate::registry::Registry;

use super::catalog::SKU_LABEL_RE;
use super::{first_digits, image_url, inner_text};

static TITLE: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    ["h1", ".t-store__t-product__title", ".t-product__title", ".t706__title"]
        .iter()
        .map(|s| Selector::parse(s).unwrap())
        .collect()
});
static SKU: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".js-store-prod-sku").unwrap());
static ACTIVE_IMAGE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-slds__item_active img").unwrap());
static SLIDE_IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-slds__item img").unwrap());
static COLOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#".t-product__option-item_active [name="Цвет"]"#).unwrap());
static MATERIAL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#".t-product__option-item_active [name="Материал"]"#).unwrap()
});
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-text, .t-store__t-product__desc").unwrap());
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t762__price-value.js-store-prod-price-val").unwrap());
static TAB_BUTTON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-store__tabs__item-button").unwrap());
static TAB_CONTENT: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-store__tabs__content").unwrap());
static EDITION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-product-edition-option").unwrap());
static ACTIVE_OPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".t-product__option-item_active").unwrap());

/// Fields of one product page, `None` when the page names no product.
pub fn parse_detail(html: &str, url: &str, registry: &Registry) -> Option<DetailRecord> {
    let doc = Html::parse_document(html);

    let raw_name = TITLE
        .iter()
        .filter_map(|sel| doc.select(sel).next())
        .map(inner_text)
        .find(|t| !t.is_empty())
        .unwrap_or_default();
    let name = infer_name_from_heuristics(&raw_name, url, &registry.name_fallbacks);
    if name.is_empty() {
        return None;
    }

    let mut detail = DetailRecord {
        name,
        vendor_code: select_text(&doc, &SKU)
            .map(|t| SKU_LABEL_RE.replace(&t, "").trim().to_string())
            .unwrap_or_default(),
        price: page_price(&doc),
        image: doc
            .select(&ACTIVE_IMAGE)
            .next()
            .and_then(image_url)
            .unwrap_or_default(),
        additional_images: doc
            .select(&SLIDE_IMAGES)
            .filter_map(image_url)
            .filter(|src| src.ends_with(".jpg"))
            .collect(),
        color: option_value(&doc, &COLOR)
            .map(|v| clean_color(&v).to_string())
            .unwrap_or_else(|| UNSPECIFIED_COLOR.to_string()),
        material: option_value(&doc, &MATERIAL).unwrap_or_default(),
        description: select_text(&doc, &DESCRIPTION).unwrap_or_default(),
        ..Default::default()
    };

    let tabs = tabs(&doc);
    if let Some(text) = tab(&tabs, &["состав", "материал"]) {
        if let Some(composition) = extract_composition(text) {
            detail.composition = composition;
        }
    }
    if let Some(age) = tab(&tabs, &["возраст"]).and_then(extract_age) {
        detail.age = age;
    }
    if let Some(text) = tab(&tabs, &["размер", "габариты"]) {
        if let Some(size) = extract_dimensions(text).summary() {
            detail.size = size;
        }
    }

    let options = edition_options(&doc);
    for (id, slot) in [
        ("Возраст", &mut detail.age),
        ("Объем", &mut detail.volume),
        ("Ручки", &mut detail.handle),
    ] {
        if slot.is_empty() {
            if let Some(value) = options.get(id) {
                *slot = value.clone();
            }
        }
    }

    if detail.volume.trim().is_empty() {
        detail.volume = volume_from_url(url).unwrap_or_default();
    }

    Some(detail)
}

fn select_text(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel).next().map(inner_text)
}

fn option_value(doc: &Html, sel: &Selector) -> Option<String> {
    doc.select(sel)
        .next()
        .and_then(|el| el.value().attr("value"))
        .map(|v| v.trim().to_string())
}

fn page_price(doc: &Html) -> String {
    let Some(el) = doc.select(&PRICE).next() else {
        return "0".to_string();
    };
    el.value()
        .attr("data-product-price-def")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .or_else(|| first_digits(&inner_text(el)))
        .unwrap_or_else(|| "0".to_string())
}

/// Tab contents keyed by lower-cased `data-tab-title`, paired by position.
fn tabs(doc: &Html) -> Vec<(String, String)> {
    let contents: Vec<ElementRef> = doc.select(&TAB_CONTENT).collect();
    doc.select(&TAB_BUTTON)
        .enumerate()
        .filter_map(|(i, btn)| {
            let title = btn.value().attr("data-tab-title")?.trim().to_lowercase();
            let content = contents.get(i)?;
            (!title.is_empty()).then(|| (title, inner_text(*content)))
        })
        .collect()
}

fn tab<'a>(tabs: &'a [(String, String)], titles: &[&str]) -> Option<&'a str> {
    titles.iter().find_map(|t| {
        tabs.iter()
            .find(|(title, _)| title.contains(t))
            .map(|(_, text)| text.as_str())
    })
}

/// Active item of every edition option block, keyed by option id.
fn edition_options(doc: &Html) -> HashMap<String, String> {
    doc.select(&EDITION)
        .filter_map(|block| {
            let id = block.value().attr("data-edition-option-id")?.trim();
            let active = block.select(&ACTIVE_OPTION).next()?;
            (!id.is_empty()).then(|| (id.to_string(), inner_text(active)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://paomma.ru/catalog/butylochki-dlya-kormleniya/tproduct/101-steklyannaya-gb240";

    fn fixture() -> DetailRecord {
        let html = std::fs::read_to_string("tests/fixtures/product.html").unwrap();
        parse_detail(&html, URL, &Registry::default()).unwrap()
    }

    #[test]
    fn reads_product_page() {
        let d = fixture();
        assert_eq!(d.name, "Стеклянная бутылочка Sage, 240 мл");
        assert_eq!(d.vendor_code, "GB240-SG");
        assert_eq!(d.price, "1290");
        assert_eq!(d.image, "https://static.tildacdn.com/sage-1.jpg");
        assert_eq!(
            d.additional_images,
            vec![
                "https://static.tildacdn.com/sage-1.jpg",
                "https://static.tildacdn.com/sage-2.jpg",
            ]
        );
        assert_eq!(d.color, "Sage");
        assert_eq!(d.material, "Стекло");
        assert!(d.description.starts_with("Особенности: широкое горлышко"));
    }

    #[test]
    fn tabs_fill_composition_age_and_size() {
        let d = fixture();
        assert_eq!(d.composition, "боросиликатное стекло, силикон");
        assert_eq!(d.age, "0-6");
        assert_eq!(d.size, "Длина: 7 см, Высота: 16.5 см");
    }

    #[test]
    fn edition_options_fill_gaps() {
        let d = fixture();
        assert_eq!(d.handle, "С ручками");
        // The edition option wins over the URL volume.
        assert_eq!(d.volume, "240 мл");
    }

    #[test]
    fn minimal_page_uses_defaults() {
        let html = "<html><body><h1>Прорезыватель Bear</h1></body></html>";
        let d = parse_detail(html, URL, &Registry::default()).unwrap();
        assert_eq!(d.name, "Прорезыватель Bear");
        assert_eq!(d.color, UNSPECIFIED_COLOR);
        assert_eq!(d.price, "0");
        assert_eq!(d.volume, "240 мл");
        assert!(d.additional_images.is_empty());
    }

    #[test]
    fn nameless_page_is_no_data() {
        let html = "<html><body><p>Страница не найдена</p></body></html>";
        assert!(parse_detail(html, "https://paomma.ru/catalog/x/tproduct/1", &Registry::default()).is_none());
    }

    #[test]
    fn empty_title_falls_back_to_url_label() {
        let html = "<html><body><h1> </h1></body></html>";
        let d = parse_detail(html, "https://paomma.ru/catalog/pustyshki/tproduct/7", &Registry::default())
            .unwrap();
        assert_eq!(d.name, "Пустышка для новорождённых");
    }
}
