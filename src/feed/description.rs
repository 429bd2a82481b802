//! Offer descriptions rebuilt from free-form product tab text.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::{present, ProductRecord};

/// Labels that product pages render as "Label. Value".
const LABELS: &[&str] = &[
    "Диаметр горлышка",
    "Диаметр широкой части бутылочки",
    "Диаметр соски",
    "Особенности",
    "Высота",
    "Поток",
    "Материал соски",
    "Материал бутылочки",
    "Объем",
    "Питание",
    "Материал изделия",
    "Тип сцеживания",
    "Аккумулятор",
    "Длина упаковки",
    "Высота упаковки",
    "Ширина упаковки",
    "размер",
];

static ARTICLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Артикул[:\s]+[A-Z0-9]+\s*").unwrap());
static BREAKS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\t\n\r]+").unwrap());
static DOTS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());
static LABEL_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Longest first, so "Высота упаковки" wins over "Высота".
    let mut labels = LABELS.to_vec();
    labels.sort_by_key(|l| std::cmp::Reverse(l.chars().count()));
    let alternation = labels
        .iter()
        .map(|l| regex::escape(l))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"({})\.\s*([^.]*)", alternation)).unwrap()
});

pub fn build_description(record: &ProductRecord, brand: &str) -> String {
    let mut fragments = present(&record.description)
        .map(fragments_from_text)
        .unwrap_or_default();
    if fragments.is_empty() {
        fragments.push(fallback(record, brand));
    }
    finish(&fragments.join(". "))
}

/// Sentence fragments of a scraped description, with "Label. Value" pairs
/// rewritten as "Label: Value" and vendor-code mentions removed.
pub fn fragments_from_text(raw: &str) -> Vec<String> {
    let text = ARTICLE_RE.replace_all(raw, "");
    let text = BREAKS_RE.replace_all(&text, ". ");
    let text = LABEL_VALUE_RE.replace_all(&text, |c: &Captures| {
        format!("{}: {}", &c[1], c[2].trim())
    });

    text.split('.')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .filter(|f| !f.to_lowercase().contains("артикул"))
        .map(str::to_string)
        .collect()
}

fn fallback(record: &ProductRecord, brand: &str) -> String {
    let name = record.name.to_lowercase();
    let volume = present(&record.volume)
        .map(|v| format!(" объёмом {}", v))
        .unwrap_or_default();

    if name.contains("стеклянная бутылочка") {
        format!(
            "Стеклянная бутылочка {}{}. Изготовлена из прочного стекла, подходит для новорождённых. Антиколиковая система. Подходит для стерилизации.",
            brand, volume
        )
    } else if name.contains("бутылочка") {
        format!(
            "Пластиковая бутылочка {}{}. Изготовлена из 100% полипропилена, подходит для новорождённых. Антиколиковая система. Удобна в уходе.",
            brand, volume
        )
    } else {
        format!("Качественный товар для детей от бренда {}. Подходит с рождения.", brand)
    }
}

/// Single trailing period, no repeated periods.
fn finish(text: &str) -> String {
    let mut out = text.trim().to_string();
    if !out.is_empty() && !out.ends_with('.') {
        out.push('.');
    }
    DOTS_RE.replace_all(&out, ".").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_description(text: &str) -> ProductRecord {
        ProductRecord {
            name: "Бутылочка".into(),
            description: text.into(),
            ..Default::default()
        }
    }

    #[test]
    fn label_value_pairs_and_article_removal() {
        let r = with_description(
            "Артикул: AB12\nДиаметр горлышка. 5 см\nПоток. Медленный\nОбъем. 240 мл",
        );
        assert_eq!(
            build_description(&r, "Paomma"),
            "Диаметр горлышка: 5 см. Поток: Медленный. Объем: 240 мл."
        );
    }

    #[test]
    fn longer_labels_take_precedence() {
        let parts = fragments_from_text("Высота упаковки. 12 см\nВысота. 8 см");
        assert_eq!(parts, vec!["Высота упаковки: 12 см", "Высота: 8 см"]);
    }

    #[test]
    fn free_text_is_split_into_sentences() {
        let r = with_description("Мягкая соска.. Подходит с рождения\n\nБез БФА");
        assert_eq!(
            build_description(&r, "Paomma"),
            "Мягкая соска. Подходит с рождения. Без БФА."
        );
    }

    #[test]
    fn article_only_description_uses_template() {
        let r = with_description("Артикул: AB12");
        assert_eq!(
            build_description(&r, "Paomma"),
            "Пластиковая бутылочка Paomma. Изготовлена из 100% полипропилена, подходит для новорождённых. Антиколиковая система. Удобна в уходе."
        );
    }

    #[test]
    fn fallback_templates() {
        let glass = ProductRecord {
            name: "Стеклянная бутылочка Sage, 240 мл".into(),
            volume: "240 мл".into(),
            ..Default::default()
        };
        let d = build_description(&glass, "Paomma");
        assert!(d.starts_with("Стеклянная бутылочка Paomma объёмом 240 мл."));
        assert!(d.ends_with("стерилизации."));

        let plastic = ProductRecord {
            name: "Пластиковая бутылочка Zephyr, 180 мл".into(),
            ..Default::default()
        };
        assert!(build_description(&plastic, "Paomma").starts_with("Пластиковая бутылочка Paomma."));

        let other = ProductRecord {
            name: "Пустышка".into(),
            ..Default::default()
        };
        assert_eq!(
            build_description(&other, "Paomma"),
            "Качественный товар для детей от бренда Paomma. Подходит с рождения."
        );
    }
}
