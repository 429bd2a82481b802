//! Pure helpers turning raw scraped strings into display values.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::registry::{first_match, KeywordRule};

static GLASS_TRIGGER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Glass\s+[A-Za-z0-9_\s]+\d{3}$").unwrap());
static GLASS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Glass\s+([A-Za-z0-9_\s]+)\s+(\d{3})$").unwrap());
static PLAIN_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+\s+\d{3}$").unwrap());
static GB_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)gb(\d+)").unwrap());
static NAME_VOLUME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3})\s*мл|(\d{3})$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());
static AGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d[+–\-]?\d*\+?)\b").unwrap());

const GLASS_URL_MARKER: &str = "/steklyannaya-gb";
const GLASS_DEFAULT_VOLUME: &str = "300";
const PLACEHOLDER_NAME: &str = "Товары для новорожденных";
const SYNTHESIZED_PREFIXES: &[&str] = &["Стеклянная бутылочка", "Пластиковая бутылочка"];

/// `"<raw> (<localized>)"` when the colour is in the table, else `raw` trimmed.
pub fn normalize_color(raw: &str, colors: &BTreeMap<String, String>) -> String {
    let raw = raw.trim();
    match colors.get(raw) {
        Some(localized) if !localized.is_empty() => format!("{} ({})", raw, localized),
        _ => raw.to_string(),
    }
}

/// Colour option value without the `:<extra>` tail or a trailing catalog path.
pub fn clean_color(raw: &str) -> &str {
    raw.split(':')
        .next()
        .unwrap_or_default()
        .split("/catalog")
        .next()
        .unwrap_or_default()
        .trim()
}

/// ASCII token of a colour, suitable inside an offer id (`"Light grey"` -> `lightgrey`).
pub fn color_token(raw: &str) -> String {
    clean_color(raw)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn needs_synthesis(name: &str) -> bool {
    let lower = name.to_lowercase();
    name.is_empty()
        || lower.contains("glass")
        || lower.contains("gb")
        || lower.contains("chehol")
        || name == PLACEHOLDER_NAME
        || PLAIN_NAME_RE.is_match(name)
        || GLASS_TRIGGER_RE.is_match(name)
}

/// Output of an earlier synthesis pass; it may still carry a trigger token
/// ("Стеклянная бутылочка Rugby, 240 мл").
fn is_synthesized(name: &str, fallbacks: &[KeywordRule]) -> bool {
    SYNTHESIZED_PREFIXES.iter().any(|p| name.starts_with(p))
        || fallbacks.iter().any(|rule| !name.is_empty() && rule.result == name)
}

/// Replaces empty, placeholder and code-like product names with a readable one.
///
/// Synthesized names never match the trigger patterns, so a second application
/// returns its input unchanged.
pub fn infer_name_from_heuristics(raw: &str, url: &str, fallbacks: &[KeywordRule]) -> String {
    let name = raw.trim();
    if is_synthesized(name, fallbacks) || !needs_synthesis(name) {
        return name.to_string();
    }

    // "Glass Almond milk 240"
    if let Some(caps) = GLASS_NAME_RE.captures(name) {
        return format!("Стеклянная бутылочка {}, {} мл", caps[1].trim(), &caps[2]);
    }
    // "Zephyr 180"
    if PLAIN_NAME_RE.is_match(name) {
        if let Some((color, volume)) = name.rsplit_once(char::is_whitespace) {
            return format!("Пластиковая бутылочка {}, {} мл", color.trim(), volume);
        }
    }
    if url.contains(GLASS_URL_MARKER) {
        let volume = GB_RE
            .captures(url)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| GLASS_DEFAULT_VOLUME.to_string());
        return format!("Стеклянная бутылочка {} мл", volume);
    }
    if let Some(rule) = first_match(fallbacks, &format!("{} {}", url, name)) {
        return rule.result.clone();
    }
    if name.to_lowercase().contains("glass") {
        return "Стеклянная бутылочка".to_string();
    }
    name.to_string()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dimensions {
    pub length: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
}

impl Dimensions {
    /// `"Длина: 10 см, Высота: 5.5 см"`, only for the dimensions found.
    pub fn summary(&self) -> Option<String> {
        let parts: Vec<String> = [
            ("Длина", &self.length),
            ("Ширина", &self.width),
            ("Высота", &self.height),
        ]
        .into_iter()
        .filter_map(|(label, v)| v.as_ref().map(|v| format!("{}: {} см", label, v)))
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Reads length/width/height from "Длина: 10,5 см"-style lines.
pub fn extract_dimensions(text: &str) -> Dimensions {
    let mut dims = Dimensions::default();
    for line in text.lines() {
        let lower = line.trim().to_lowercase();
        let slot = if lower.contains("длина") {
            &mut dims.length
        } else if lower.contains("ширина") {
            &mut dims.width
        } else if lower.contains("высота") {
            &mut dims.height
        } else {
            continue;
        };
        if let Some(m) = NUMBER_RE.find(&lower) {
            *slot = Some(m.as_str().replace(',', "."));
        }
    }
    dims
}

/// Stable vendor code for products whose page shows none: `<tag>_<6 hex>`.
pub fn derive_vendor_code(name: &str, link: &str, brand_tag: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}", name, link).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", brand_tag, digest[..6].to_uppercase())
}

/// Product link with its `#fragment` removed; `None` for anchor-only and
/// trailing-slash links, which point at listings rather than products.
pub fn canonical_link(raw: &str) -> Option<String> {
    let link = raw.trim().split('#').next().unwrap_or_default().trim();
    if link.is_empty() || link.ends_with('/') {
        None
    } else {
        Some(link.to_string())
    }
}

/// First age token of an "age" tab: `6`, `0-6`, `3+`.
pub fn extract_age(text: &str) -> Option<String> {
    AGE_RE
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|a| !a.is_empty())
}

/// Materials of the bottle and straw from a composition tab.
pub fn extract_composition(text: &str) -> Option<String> {
    let parts: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("бутылочка") || lower.contains("трубочка")
        })
        .filter_map(|line| line.split_once(':').map(|(_, v)| v.trim()))
        .filter(|v| !v.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// `"240 мл"` from names like "Бутылочка 240 мл" or "Zephyr 240".
pub fn volume_from_name(name: &str) -> Option<String> {
    let caps = NAME_VOLUME_RE.captures(name)?;
    let digits = caps.get(1).or_else(|| caps.get(2))?;
    Some(format!("{} мл", digits.as_str()))
}

/// `"240 мл"` from product URLs carrying a `gb240` slug.
pub fn volume_from_url(url: &str) -> Option<String> {
    GB_RE.captures(url).map(|c| format!("{} мл", &c[1]))
}
