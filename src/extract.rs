use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{Context, FieldValue, Metadata};
use crate::rules::{RuleSet, CATALOG};

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Extract structured metadata from a raw HTML document.
///
/// The document is parsed once and every catalog field is evaluated against
/// it independently; fields that produce nothing are left out of the mapping.
/// The HTML parser is lenient, so the only input that can fail is the page
/// URL itself.
pub fn parse(url: &str, html: &str) -> Result<Metadata, ExtractionError> {
    let base = Url::parse(url).map_err(|e| ExtractionError::InvalidUrl(e.to_string()))?;
    let ctx = Context { url: base };
    let document = Html::parse_document(html);

    let mut metadata = Metadata::new();
    for field in CATALOG {
        if let Some(value) = evaluate(&field.rule_set, &document, &ctx) {
            metadata.insert(field.name, value);
        }
    }
    Ok(metadata)
}

// ── Rule-set evaluation ──────────────────────────────────────────────────────

/// Run one rule-set against the document: pick the best-scoring raw value,
/// fall back to the default when nothing truthy matched, then apply the
/// processor pipeline and a final trim. Empty results count as absent.
pub(crate) fn evaluate(rule_set: &RuleSet, document: &Html, ctx: &Context) -> Option<FieldValue> {
    let raw = select_best(rule_set, document)
        .and_then(|(_, value)| value)
        .filter(|value| !value.is_empty());

    let value = match raw {
        Some(text) => FieldValue::Text(text),
        None => FieldValue::Text(
            rule_set
                .default_value
                .as_ref()
                .and_then(|default| default.value(ctx))
                .filter(|value| !value.is_empty())?,
        ),
    };

    let processed = rule_set
        .processors
        .iter()
        .fold(value, |value, processor| processor.apply(value, ctx));

    Some(processed.trimmed()).filter(|value| !value.is_empty())
}

/// Fold over every (rule, element) pair in priority order. A pair wins only
/// with a strictly higher score, so the first element to reach a given
/// maximum keeps it; elements from later rules can outrank earlier ones only
/// through a scorer override. The winner's value is extracted as-is, even
/// when empty.
fn select_best(rule_set: &RuleSet, document: &Html) -> Option<(u32, Option<String>)> {
    let rule_count = rule_set.rules.len() as u32;

    rule_set
        .rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| match Selector::parse(rule.selector) {
            Ok(selector) => {
                let elements: Vec<ElementRef<'_>> = document.select(&selector).collect();
                Some((rule, rule_count - index as u32, elements))
            }
            Err(err) => {
                tracing::warn!(selector = rule.selector, %err, "skipping unparsable selector");
                None
            }
        })
        .flat_map(|(rule, base_score, elements)| {
            elements
                .into_iter()
                .map(move |element| (rule, base_score, element))
        })
        .fold(None, |best, (rule, base_score, element)| {
            let score = rule_set
                .scorers
                .iter()
                .filter_map(|scorer| scorer.score(&element))
                .last()
                .unwrap_or(base_score);
            match best {
                Some((best_score, _)) if score <= best_score => best,
                _ => Some((score, rule.extractor.extract(&element))),
            }
        })
}

// ── Tests ────────────────────────────────────────────────────────────────────
