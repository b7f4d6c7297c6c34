use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};
use tracing::warn;

static OPERATOR_ATTR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-operator]").expect("static selector"));

static TEXT_NODES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span, div").expect("static selector"));

/// Operators the site is known to sell, most specific first.
static KNOWN_OPERATORS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)SJ\s+(High|Night|Regional|Intercity|Express)",
        r"(?i)\bSJ\b",
        r"(?i)Mälartåg",
        r"(?i)Öresundståg",
        r"(?i)Snälltåget",
        r"(?i)Tågab",
        r"(?i)Arriva",
        r"(?i)Vy\s+Tåg",
        r"(?i)MTR\s+Express",
        r"(?i)FlixTrain",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static operator pattern"))
    .collect()
});

static TRAIN_KEYWORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tåg|train|SJ|express|regional").expect("static keyword"));

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}").expect("static time pattern"));

static ALL_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+$").expect("static digits pattern"));

/// Resolve the operator label of a departure card.
///
/// Tries, in order: an explicit `data-operator` attribute, the known
/// operator names, then any short train-ish label in a `span` or `div`.
/// Returns an empty string when all three come up empty.
pub(super) fn resolve_operator(card: ElementRef<'_>, departure: &str, arrival: &str) -> String {
    let found = from_attribute(card)
        .or_else(|| from_known_names(card))
        .or_else(|| from_short_labels(card));

    match found {
        Some(operator) => operator,
        None => {
            let sample: String = card.inner_html().chars().take(200).collect();
            warn!(%departure, %arrival, %sample, "could not extract operator");
            String::new()
        }
    }
}

fn from_attribute(card: ElementRef<'_>) -> Option<String> {
    card.select(&OPERATOR_ATTR)
        .next()
        .and_then(|el| el.value().attr("data-operator"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn from_known_names(card: ElementRef<'_>) -> Option<String> {
    let text = card.text().collect::<Vec<_>>().join(" ");
    KNOWN_OPERATORS
        .iter()
        .find_map(|re| re.find(&text))
        .map(|m| m.as_str().trim().to_string())
}

fn from_short_labels(card: ElementRef<'_>) -> Option<String> {
    card.select(&TEXT_NODES)
        .map(|el| el.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .find(|text| looks_like_operator(text))
}

fn looks_like_operator(text: &str) -> bool {
    !text.is_empty()
        && text.chars().count() < 30
        && !TIME.is_match(text)
        && !ALL_DIGITS.is_match(text)
        && TRAIN_KEYWORD.is_match(text)
}
