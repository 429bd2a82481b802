//! YML catalog serialization.

use std::collections::HashMap;
use std::io::Write;

use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::warn;

use crate::error::FeedError;
use crate::registry::Registry;

use super::offer::Offer;

type XmlResult = quick_xml::Result<()>;

pub fn render(
    registry: &Registry,
    offers: &[Offer],
    collection_pictures: &HashMap<String, String>,
    generated_at: &str,
) -> Result<String, FeedError> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_catalog(&mut w, registry, offers, collection_pictures, generated_at)
        .map_err(|e| FeedError::Xml(e.to_string()))?;
    String::from_utf8(w.into_inner()).map_err(|e| FeedError::Xml(e.to_string()))
}

fn write_catalog<W: Write>(
    w: &mut Writer<W>,
    registry: &Registry,
    offers: &[Offer],
    collection_pictures: &HashMap<String, String>,
    generated_at: &str,
) -> XmlResult {
    let shop = &registry.shop;
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    w.write_event(Event::Start(
        BytesStart::new("yml_catalog").with_attributes([("date", generated_at)]),
    ))?;
    start(w, "shop")?;
    text(w, "name", &shop.name)?;
    text(w, "company", &shop.company)?;
    text(w, "url", &shop.url)?;
    text(w, "platform", &shop.platform)?;

    start(w, "currencies")?;
    w.write_event(Event::Empty(
        BytesStart::new("currency").with_attributes([("id", shop.currency.as_str()), ("rate", "1")]),
    ))?;
    end(w, "currencies")?;

    start(w, "categories")?;
    for c in &registry.collections {
        w.write_event(Event::Start(
            BytesStart::new("category").with_attributes([("id", c.external_id.as_str())]),
        ))?;
        w.write_event(Event::Text(BytesText::from_escaped(partial_escape(&c.name))))?;
        end(w, "category")?;
    }
    end(w, "categories")?;

    start(w, "offers")?;
    for offer in offers {
        write_offer(w, offer, registry)?;
    }
    end(w, "offers")?;

    start(w, "collections")?;
    for c in &registry.collections {
        w.write_event(Event::Start(
            BytesStart::new("collection").with_attributes([("id", c.key.as_str())]),
        ))?;
        text(w, "name", &c.name)?;
        let url = match registry.collection_url(&c.key) {
            Some(u) => u.to_string(),
            None => {
                warn!("No listing page for collection {}", c.name);
                format!("{}/{}", shop.url.trim_end_matches('/'), c.key)
            }
        };
        cdata(w, "url", &url)?;
        if let Some(picture) = collection_pictures.get(&c.key) {
            text(w, "picture", picture)?;
        }
        text(w, "description", &registry.collection_blurb(&c.key))?;
        end(w, "collection")?;
    }
    end(w, "collections")?;

    end(w, "shop")?;
    end(w, "yml_catalog")?;
    Ok(())
}

fn write_offer<W: Write>(w: &mut Writer<W>, offer: &Offer, registry: &Registry) -> XmlResult {
    w.write_event(Event::Start(
        BytesStart::new("offer").with_attributes([("id", offer.id.as_str()), ("available", "true")]),
    ))?;
    text(w, "name", &offer.name)?;
    text(w, "vendor", &registry.shop.name)?;
    text(w, "vendorCode", &offer.vendor_code)?;
    text(w, "model", &offer.vendor_code)?;
    text(w, "price", &offer.price.to_string())?;
    text(w, "currencyId", &registry.shop.currency)?;
    text(w, "categoryId", &offer.category_id)?;
    cdata(w, "url", &offer.url)?;
    for picture in &offer.pictures {
        text(w, "picture", picture)?;
    }
    for (name, value) in &offer.params {
        param(w, name, value)?;
    }
    if let Some(key) = &offer.collection {
        param(w, "collection", key)?;
        text(w, "collectionId", key)?;
    }
    text(w, "description", &offer.description)?;
    text(w, "sales_notes", &offer.sales_notes)?;
    end(w, "offer")
}

fn start<W: Write>(w: &mut Writer<W>, name: &str) -> XmlResult {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end<W: Write>(w: &mut Writer<W>, name: &str) -> XmlResult {
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// `<name>value</name>` with `&`, `<` and `>` escaped.
fn text<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> XmlResult {
    start(w, name)?;
    w.write_event(Event::Text(BytesText::from_escaped(partial_escape(value))))?;
    end(w, name)
}

fn cdata<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> XmlResult {
    start(w, name)?;
    w.write_event(Event::CData(BytesCData::new(value)))?;
    end(w, name)
}

fn param<W: Write>(w: &mut Writer<W>, name: &str, value: &str) -> XmlResult {
    w.write_event(Event::Start(
        BytesStart::new("param").with_attributes([("name", name)]),
    ))?;
    w.write_event(Event::Text(BytesText::from_escaped(partial_escape(value))))?;
    end(w, "param")
}
