use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use url::Url;

use crate::models::{Context, FieldValue};

// ── Lazy static regexes ──────────────────────────────────────────────────────

static WWW_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^www[a-zA-Z0-9]*\.").unwrap());

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

// ── Rule data model ──────────────────────────────────────────────────────────

/// Reads a raw candidate value out of a matched element.
#[derive(Debug, Clone, Copy)]
pub enum Extractor {
    /// Read the named attribute.
    Attr(&'static str),
    /// Read the aggregated text content.
    Text,
}

/// May override an element's priority-derived score.
#[derive(Debug, Clone, Copy)]
pub enum Scorer {
    /// First digit run in the `sizes` attribute, so `sizes="32x32"` scores 32.
    DeclaredSizes,
}

/// Transformation applied to the winning value.
#[derive(Debug, Clone, Copy)]
pub enum Processor {
    /// Resolve the value to absolute form against the page URL.
    ResolveUrl,
    /// Split a comma-separated string into trimmed pieces.
    SplitCommas,
    /// Keep the primary language subtag: text before the first `-`.
    PrimarySubtag,
    /// Collapse whitespace runs into single spaces and cap at 500 chars.
    Condense,
}

/// Produces a value when no rule yielded one.
#[derive(Debug, Clone, Copy)]
pub enum DefaultValue {
    /// The URL the page was fetched from.
    ContextUrl,
    /// `favicon.ico`, left for `Processor::ResolveUrl` to absolutize.
    Favicon,
    /// Site name derived from the host of the page URL.
    ProviderFromHost,
}

/// One candidate selector and how to read a value from its matches.
pub struct Rule {
    pub selector: &'static str,
    pub extractor: Extractor,
}

/// Everything needed to extract one field. Rules are stored in priority
/// order: earlier rules outrank later ones unless a scorer says otherwise.
pub struct RuleSet {
    pub rules: &'static [Rule],
    pub scorers: &'static [Scorer],
    pub default_value: Option<DefaultValue>,
    pub processors: &'static [Processor],
}

pub struct FieldRules {
    pub name: &'static str,
    pub rule_set: RuleSet,
}

// ── Tag behavior ─────────────────────────────────────────────────────────────

impl Extractor {
    pub fn extract(&self, element: &ElementRef<'_>) -> Option<String> {
        match self {
            Extractor::Attr(name) => element.value().attr(name).map(str::to_string),
            Extractor::Text => Some(element.text().collect::<String>()),
        }
    }
}

impl Scorer {
    /// A zero or unparsable size hint yields no override.
    pub fn score(&self, element: &ElementRef<'_>) -> Option<u32> {
        match self {
            Scorer::DeclaredSizes => element
                .value()
                .attr("sizes")
                .and_then(|sizes| DIGIT_RUN_RE.find(sizes))
                .and_then(|run| run.as_str().parse::<u32>().ok())
                .filter(|size| *size > 0),
        }
    }
}

impl Processor {
    pub fn apply(&self, value: FieldValue, ctx: &Context) -> FieldValue {
        match (self, value) {
            (Processor::ResolveUrl, FieldValue::Text(text)) => {
                FieldValue::Text(resolve_against(&ctx.url, &text))
            }
            (Processor::SplitCommas, FieldValue::Text(text)) => FieldValue::List(
                text.split(',')
                    .map(|piece| piece.trim().to_string())
                    .collect(),
            ),
            (Processor::PrimarySubtag, FieldValue::Text(text)) => {
                FieldValue::Text(text.split('-').next().unwrap_or("").to_string())
            }
            (Processor::Condense, FieldValue::Text(text)) => FieldValue::Text(condense(&text)),
            (_, value) => value,
        }
    }
}

impl DefaultValue {
    pub fn value(&self, ctx: &Context) -> Option<String> {
        match self {
            DefaultValue::ContextUrl => Some(ctx.url.to_string()),
            DefaultValue::Favicon => Some("favicon.ico".to_string()),
            DefaultValue::ProviderFromHost => ctx.url.host_str().map(provider_from_host),
        }
    }
}

fn resolve_against(base: &Url, value: &str) -> String {
    base.join(value)
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| value.to_string())
}

fn condense(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(500).collect()
}

/// Human-readable site name from a host: drop one leading `www`-like label,
/// collapse a `.co.` infix, drop the final label, join the rest with spaces.
/// `www.example.co.uk` becomes `example`.
fn provider_from_host(host: &str) -> String {
    let host = WWW_PREFIX_RE.replace(host, "");
    let host = host.replacen(".co.", ".", 1);
    let labels: Vec<&str> = host.split('.').collect();
    labels[..labels.len() - 1].join(" ")
}

// ── Catalog ──────────────────────────────────────────────────────────────────

/// Static per-field extraction table. Attribute-value matching is
/// case-insensitive (`i` flag) where real pages vary the casing.
pub static CATALOG: &[FieldRules] = &[
    FieldRules {
        name: "title",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: r#"meta[property="og:title"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[name="twitter:title"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[property="twitter:title"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[name="hdl"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: "title",
                    extractor: Extractor::Text,
                },
            ],
            scorers: &[],
            default_value: None,
            processors: &[],
        },
    },
    FieldRules {
        name: "description",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: r#"meta[property="og:description"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[name="description" i]"#,
                    extractor: Extractor::Attr("content"),
                },
            ],
            scorers: &[],
            default_value: None,
            processors: &[],
        },
    },
    FieldRules {
        name: "snippet",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: "article p",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: "main p",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: "#main p",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: "p",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: "main",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: ".post__content",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: ".post .content",
                    extractor: Extractor::Text,
                },
                Rule {
                    selector: "#pagebody .storycontent",
                    extractor: Extractor::Text,
                },
            ],
            scorers: &[],
            default_value: None,
            processors: &[Processor::Condense],
        },
    },
    FieldRules {
        name: "url",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: "a.amp-canurl",
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="canonical"]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"meta[property="og:url"]"#,
                    extractor: Extractor::Attr("content"),
                },
            ],
            scorers: &[],
            default_value: Some(DefaultValue::ContextUrl),
            processors: &[Processor::ResolveUrl],
        },
    },
    FieldRules {
        name: "icon",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: r#"link[rel="apple-touch-icon"]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="apple-touch-icon-precomposed"]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="icon" i]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="fluid-icon"]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="shortcut icon" i]"#,
                    extractor: Extractor::Attr("href"),
                },
                Rule {
                    selector: r#"link[rel="mask-icon"]"#,
                    extractor: Extractor::Attr("href"),
                },
            ],
            scorers: &[Scorer::DeclaredSizes],
            default_value: Some(DefaultValue::Favicon),
            processors: &[Processor::ResolveUrl],
        },
    },
    FieldRules {
        name: "image",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: r#"meta[property="og:image:secure_url"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[property="og:image:url"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[property="og:image"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[name="twitter:image"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[property="twitter:image"]"#,
                    extractor: Extractor::Attr("content"),
                },
                Rule {
                    selector: r#"meta[name="thumbnail"]"#,
                    extractor: Extractor::Attr("content"),
                },
            ],
            scorers: &[],
            default_value: None,
            processors: &[Processor::ResolveUrl],
        },
    },
    FieldRules {
        name: "type",
        rule_set: RuleSet {
            rules: &[Rule {
                selector: r#"meta[property="og:type"]"#,
                extractor: Extractor::Attr("content"),
            }],
            scorers: &[],
            default_value: None,
            processors: &[],
        },
    },
    FieldRules {
        name: "keywords",
        rule_set: RuleSet {
            rules: &[Rule {
                selector: r#"meta[name="keywords" i]"#,
                extractor: Extractor::Attr("content"),
            }],
            scorers: &[],
            default_value: None,
            processors: &[Processor::SplitCommas],
        },
    },
    FieldRules {
        name: "language",
        rule_set: RuleSet {
            rules: &[
                Rule {
                    selector: "html[lang]",
                    extractor: Extractor::Attr("lang"),
                },
                Rule {
                    selector: r#"meta[name="language" i]"#,
                    extractor: Extractor::Attr("content"),
                },
            ],
            scorers: &[],
            default_value: None,
            processors: &[Processor::PrimarySubtag],
        },
    },
    FieldRules {
        name: "provider",
        rule_set: RuleSet {
            rules: &[Rule {
                selector: r#"meta[property="og:site_name"]"#,
                extractor: Extractor::Attr("content"),
            }],
            scorers: &[],
            default_value: Some(DefaultValue::ProviderFromHost),
            processors: &[],
        },
    },
];

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn ctx(url: &str) -> Context {
        Context {
            url: Url::parse(url).unwrap(),
        }
    }

    fn first_element<'a>(document: &'a Html, selector: &str) -> ElementRef<'a> {
        let selector = Selector::parse(selector).unwrap();
        document.select(&selector).next().unwrap()
    }

    #[test]
    fn every_catalog_selector_parses() {
        for field in CATALOG {
            assert!(!field.rule_set.rules.is_empty(), "{}", field.name);
            for rule in field.rule_set.rules {
                assert!(
                    Selector::parse(rule.selector).is_ok(),
                    "bad selector for {}: {}",
                    field.name,
                    rule.selector
                );
            }
        }
    }

    #[test]
    fn field_names_are_unique() {
        let mut names: Vec<&str> = CATALOG.iter().map(|f| f.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn attr_extractor_reads_attribute() {
        let document = Html::parse_document(r#"<meta name="hdl" content="Headline">"#);
        let element = first_element(&document, r#"meta[name="hdl"]"#);
        assert_eq!(
            Extractor::Attr("content").extract(&element).as_deref(),
            Some("Headline")
        );
        assert_eq!(Extractor::Attr("missing").extract(&element), None);
    }

    #[test]
    fn text_extractor_aggregates_descendants() {
        let document = Html::parse_document("<p>Hello <b>bold</b> world</p>");
        let element = first_element(&document, "p");
        assert_eq!(
            Extractor::Text.extract(&element).as_deref(),
            Some("Hello bold world")
        );
    }

    #[test]
    fn declared_sizes_scorer_reads_first_digit_run() {
        let document = Html::parse_document(
            r#"<link rel="icon" sizes="32x32"><link rel="icon" sizes="any"><link rel="icon">"#,
        );
        let selector = Selector::parse("link").unwrap();
        let scores: Vec<Option<u32>> = document
            .select(&selector)
            .map(|el| Scorer::DeclaredSizes.score(&el))
            .collect();
        assert_eq!(scores, vec![Some(32), None, None]);
    }

    #[test]
    fn split_commas_keeps_pieces_trimmed() {
        let value = Processor::SplitCommas.apply(
            FieldValue::Text("a, b ,c".to_string()),
            &ctx("https://example.com"),
        );
        assert_eq!(
            value,
            FieldValue::List(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn primary_subtag_drops_region() {
        let value = Processor::PrimarySubtag.apply(
            FieldValue::Text("en-US".to_string()),
            &ctx("https://example.com"),
        );
        assert_eq!(value, FieldValue::Text("en".to_string()));
    }

    #[test]
    fn condense_collapses_whitespace_and_caps_length() {
        let long = format!("{}\n\n {}", "a".repeat(300), "b".repeat(300));
        let value = Processor::Condense.apply(
            FieldValue::Text(long),
            &ctx("https://example.com"),
        );
        match value {
            FieldValue::Text(text) => {
                assert_eq!(text.chars().count(), 500);
                assert!(text.starts_with("aaa"));
                assert!(text.ends_with('b'));
                assert!(text.contains("a b"));
            }
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn resolve_url_makes_relative_values_absolute() {
        let value = Processor::ResolveUrl.apply(
            FieldValue::Text("/img/pic.png".to_string()),
            &ctx("https://example.com/articles/1"),
        );
        assert_eq!(
            value,
            FieldValue::Text("https://example.com/img/pic.png".to_string())
        );
    }

    #[test]
    fn provider_default_strips_www_and_co_infix() {
        let ctx = ctx("https://www.example.co.uk/page");
        assert_eq!(
            DefaultValue::ProviderFromHost.value(&ctx).as_deref(),
            Some("example")
        );
    }

    #[test]
    fn provider_default_keeps_non_www_subdomains() {
        let ctx = ctx("https://news.ycombinator.com/item");
        assert_eq!(
            DefaultValue::ProviderFromHost.value(&ctx).as_deref(),
            Some("news ycombinator")
        );
    }

    #[test]
    fn favicon_default_is_relative_until_processed() {
        let ctx = ctx("https://example.com/a/b");
        assert_eq!(
            DefaultValue::Favicon.value(&ctx).as_deref(),
            Some("favicon.ico")
        );
    }
}
