//! Fares on the ticket selection page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::domain::{FareClass, FarePrices, PriceQuote};

/// Price elements used by fares that are not split by class.
const TOTAL_PRICE_IDS: [&str; 3] = ["TOTAL-price", "total-price", "price"];

const UNAVAILABLE_MARKERS: [&str; 2] = ["Unavailable", "Sold out"];

static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d,\u{a0}\u{202f}]*").expect("static amount pattern")
});

fn test_id_selector(id: &str) -> Option<Selector> {
    Selector::parse(&format!(r#"[data-testid="{id}"]"#)).ok()
}

fn find_by_test_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let selector = test_id_selector(id)?;
    document.select(&selector).next()
}

/// Extract the quote for one fare class.
pub fn extract_price(html: &str, class: FareClass) -> PriceQuote {
    let document = Html::parse_document(html);
    find_by_test_id(&document, class.test_id())
        .map(quote_from_element)
        .unwrap_or_else(PriceQuote::unavailable)
}

/// Extract quotes for every fare class.
///
/// When the page has no per-class price elements at all, a single total
/// price element is read as the second-class fare.
pub fn extract_prices(html: &str) -> FarePrices {
    let document = Html::parse_document(html);

    let per_class: Vec<Option<ElementRef<'_>>> = FareClass::ALL
        .iter()
        .map(|class| find_by_test_id(&document, class.test_id()))
        .collect();

    if per_class.iter().all(Option::is_none) {
        if let Some(total) = TOTAL_PRICE_IDS
            .iter()
            .find_map(|id| find_by_test_id(&document, id))
        {
            debug!("no per-class fares, using total price");
            return FarePrices {
                second_class: quote_from_element(total),
                ..FarePrices::unavailable()
            };
        }
        return FarePrices::unavailable();
    }

    let quote = |i: usize| {
        per_class[i]
            .map(quote_from_element)
            .unwrap_or_else(PriceQuote::unavailable)
    };

    FarePrices {
        second_class: quote(0),
        second_class_calm: quote(1),
        first_class: quote(2),
    }
}

fn quote_from_element(el: ElementRef<'_>) -> PriceQuote {
    if marked_unavailable(el) {
        return PriceQuote::unavailable();
    }
    let text = el.text().collect::<String>();
    parse_amount(&text)
        .map(PriceQuote::available)
        .unwrap_or_else(PriceQuote::unavailable)
}

/// The site flags sold-out classes with a marker next to the price.
fn marked_unavailable(el: ElementRef<'_>) -> bool {
    let scope = el.parent().and_then(ElementRef::wrap).unwrap_or(el);
    let text = scope.text().collect::<String>();
    UNAVAILABLE_MARKERS.iter().any(|m| text.contains(m))
}

/// First run of digits in `text`, with thousands separators removed.
fn parse_amount(text: &str) -> Option<u32> {
    let digits: String = AMOUNT
        .find(text)?
        .as_str()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
