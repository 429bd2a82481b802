use std::sync::LazyLock;

use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::model::CatalogStub;
use crate::normalize::{canonical_link, infer_name_from_heuristics, volume_from_name};
use crate::registry::{first_match, CatalogFilter, Registry};

use super::{first_digits, image_url, inner_text};

static CARD: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-product, .t-store__card, .t-product").unwrap());
static NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".js-product-name, .t-store__card__title, h3, .t-product__title").unwrap()
});
static SKU: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-store-prod-sku, .t-store__card__sku").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMAGE: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".js-product-img, img").unwrap());
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-product-price.js-store-prod-price-val").unwrap());
static DESCR_PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".js-store-prod-descr strong").unwrap());

pub(crate) static SKU_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Артикул[:\s]*").unwrap());

/// Product stubs of one listing page. Cards without a name or a product
/// link are left out.
pub fn parse_catalog(html: &str, filter: &CatalogFilter, registry: &Registry) -> Vec<CatalogStub> {
    let doc = Html::parse_document(html);
    let base = Url::parse(&filter.url).ok();
    doc.select(&CARD)
        .filter_map(|card| parse_card(card, base.as_ref(), filter, registry))
        .collect()
}

fn parse_card(
    card: ElementRef,
    base: Option<&Url>,
    filter: &CatalogFilter,
    registry: &Registry,
) -> Option<CatalogStub> {
    let name_el = card.select(&NAME).next()?;
    let href = card.select(&LINK).next()?.value().attr("href")?;
    // "#order" must be rejected before it resolves to the listing URL itself.
    let link = canonical_link(href).and_then(|h| canonical_link(&resolve(&h, base)))?;

    let name = infer_name_from_heuristics(&inner_text(name_el), &link, &registry.name_fallbacks);
    let mut vendor_code = card
        .select(&SKU)
        .next()
        .map(|el| SKU_LABEL_RE.replace(&inner_text(el), "").trim().to_string())
        .unwrap_or_default();

    let mut collection = filter.collection.clone();
    if let Some(rule) = first_match(&registry.collection_rules, &name) {
        collection = rule.result.clone();
        if vendor_code.is_empty() {
            vendor_code = rule.vendor_code.clone().unwrap_or_default();
        }
    }

    Some(CatalogStub {
        volume: volume_from_name(&name).unwrap_or_default(),
        name,
        vendor_code,
        price: card_price(card),
        link,
        image: card.select(&IMAGE).next().and_then(image_url).unwrap_or_default(),
        collection,
    })
}

/// `data-product-price-def`, then the price text, then a bold price in the
/// card description ("от 465 ₽"); `"0"` when none is found.
fn card_price(card: ElementRef) -> String {
    let from_price = card.select(&PRICE).next().and_then(|el| {
        el.value()
            .attr("data-product-price-def")
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != "0")
            .map(str::to_string)
            .or_else(|| first_digits(&inner_text(el)))
    });
    from_price
        .filter(|p| p != "0")
        .or_else(|| {
            card.select(&DESCR_PRICE)
                .next()
                .and_then(|el| first_digits(&inner_text(el)))
        })
        .unwrap_or_else(|| "0".to_string())
}

fn resolve(href: &str, base: Option<&Url>) -> String {
    match base.and_then(|b| b.join(href.trim()).ok()) {
        Some(url) => url.to_string(),
        None => href.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Vec<CatalogStub> {
        let html = std::fs::read_to_string("tests/fixtures/catalog.html").unwrap();
        let registry = Registry::default();
        let filter = registry
            .filters
            .iter()
            .find(|f| f.collection == "butylochki")
            .unwrap()
            .clone();
        parse_catalog(&html, &filter, &registry)
    }

    #[test]
    fn cards_become_stubs() {
        let stubs = fixture();
        let links: Vec<&str> = stubs.iter().map(|s| s.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://paomma.ru/catalog/butylochki-dlya-kormleniya/tproduct/101-glass-sage-240",
                "https://paomma.ru/catalog/butylochki-dlya-kormleniya/tproduct/102-zephyr-180",
                "https://paomma.ru/catalog/butylochki-dlya-kormleniya/tproduct/102-zephyr-180",
                "https://paomma.ru/catalog/molokootsos/tproduct/103-pump",
            ]
        );
    }

    #[test]
    fn names_prices_and_volumes() {
        let stubs = fixture();
        let glass = &stubs[0];
        assert_eq!(glass.name, "Стеклянная бутылочка Sage, 240 мл");
        assert_eq!(glass.price, "1290");
        assert_eq!(glass.volume, "240 мл");
        assert_eq!(glass.vendor_code, "GB240-SG");
        assert_eq!(glass.image, "https://static.tildacdn.com/sage.jpg");
        assert_eq!(glass.collection, "butylochki");

        let plastic = &stubs[1];
        assert_eq!(plastic.name, "Пластиковая бутылочка Zephyr, 180 мл");
        assert_eq!(plastic.price, "890");
        assert_eq!(plastic.volume, "180 мл");
    }

    #[test]
    fn price_falls_back_to_description() {
        assert_eq!(fixture()[2].price, "465");
    }

    #[test]
    fn milk_pumps_move_to_their_collection() {
        let pump = &fixture()[3];
        assert_eq!(pump.collection, "molokootsosy");
        assert_eq!(pump.vendor_code, "MOLOKOOSC_001");
        assert_eq!(pump.price, "0");
    }
}
