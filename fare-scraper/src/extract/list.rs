//! Departure cards on the results list.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::operator::resolve_operator;
use crate::domain::{Candidate, duration_between};

static TEST_ID: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-testid]").expect("static selector"));

static CARD_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f-]{36}$").expect("static card id pattern"));

static TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}:\d{2}").expect("static time pattern"));

static CHANGES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*change").expect("static changes pattern"));

/// Is this element a departure card?
fn is_card(el: &ElementRef<'_>) -> bool {
    el.value()
        .attr("data-testid")
        .is_some_and(|id| CARD_ID.is_match(id))
}

/// Parse every departure card on the results list, in document order.
pub fn extract_candidates(html: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let candidates: Vec<Candidate> = document
        .select(&TEST_ID)
        .filter(is_card)
        .enumerate()
        .map(|(card_index, card)| parse_card(card, card_index))
        .collect();

    debug!(count = candidates.len(), "extracted departure cards");
    candidates
}

fn parse_card(card: ElementRef<'_>, card_index: usize) -> Candidate {
    let inner = card.inner_html();

    let mut times = TIME.find_iter(&inner).map(|m| m.as_str().to_string());
    let departure_time = times.next().unwrap_or_default();
    let arrival_time = times.next().unwrap_or_default();

    let duration = if departure_time.is_empty() || arrival_time.is_empty() {
        String::new()
    } else {
        duration_between(&departure_time, &arrival_time)
    };

    let changes = CHANGES
        .captures(&inner)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(0);

    let operator = resolve_operator(card, &departure_time, &arrival_time);

    Candidate {
        departure_time,
        arrival_time,
        duration,
        changes,
        operator,
        card_index,
    }
}

/// JavaScript that clicks the button of the card whose first time is
/// `departure_time`. Evaluates to `true` when a button was clicked.
///
/// Card detection mirrors [`extract_candidates`] so the browser clicks the
/// same card that was parsed.
pub fn click_card_script(departure_time: &str) -> String {
    let target = serde_json::Value::String(departure_time.to_string());
    format!(
        r#"(() => {{
    const target = {target};
    const cards = Array.from(document.querySelectorAll('[data-testid]'))
        .filter((el) => /^[0-9a-f-]{{36}}$/.test(el.getAttribute('data-testid') || ''));
    for (const card of cards) {{
        const first = card.innerHTML.match(/\d{{2}}:\d{{2}}/);
        if (!first || first[0] !== target) continue;
        const button = card.querySelector('button');
        if (!button) return false;
        button.click();
        return true;
    }}
    return false;
}})()"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(id: &str, body: &str) -> String {
        format!(r#"<div data-testid="{id}">{body}</div>"#)
    }

    fn uuid(i: u32) -> String {
        format!("{i:08x}-0000-4000-8000-{i:012x}")
    }

    #[test]
    fn extracts_cards_in_document_order() {
        let html = format!(
            "<html><body>{}{}<div data-testid=\"header\">08:00</div></body></html>",
            card(
                &uuid(1),
                "<span>06:10</span><span>09:05</span><span>0 changes</span>\
                 <span data-operator=\"SJ High-speed train\"></span><button>Select</button>"
            ),
            card(
                &uuid(2),
                "<span>23:50</span><span>00:20</span><span>2 changes</span><span>Mälartåg</span>"
            ),
        );

        let candidates = extract_candidates(&html);
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.departure_time, "06:10");
        assert_eq!(first.arrival_time, "09:05");
        assert_eq!(first.duration, "2 h 55 min");
        assert_eq!(first.changes, 0);
        assert_eq!(first.operator, "SJ High-speed train");
        assert_eq!(first.card_index, 0);

        let second = &candidates[1];
        assert_eq!(second.duration, "0 h 30 min");
        assert_eq!(second.changes, 2);
        assert_eq!(second.operator, "Mälartåg");
        assert_eq!(second.card_index, 1);
    }

    #[test]
    fn missing_times_yield_empty_fields() {
        let html = card(&uuid(7), "<span>Cancelled</span>");
        let candidates = extract_candidates(&html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].departure_time, "");
        assert_eq!(candidates[0].arrival_time, "");
        assert_eq!(candidates[0].duration, "");
    }

    #[test]
    fn single_time_has_no_duration() {
        let html = card(&uuid(3), "<span>10:00</span>");
        let c = &extract_candidates(&html)[0];
        assert_eq!(c.departure_time, "10:00");
        assert_eq!(c.arrival_time, "");
        assert_eq!(c.duration, "");
    }

    #[test]
    fn changes_default_to_direct() {
        let html = card(&uuid(4), "<span>08:00</span><span>12:00</span><span>Direct</span>");
        let c = &extract_candidates(&html)[0];
        assert_eq!(c.changes, 0);
        assert_eq!(c.duration, "4 h");
    }

    #[test]
    fn non_uuid_test_ids_ignored() {
        let html = r#"<div data-testid="SECOND-price">08:00</div>
            <div data-testid="0000-not-a-uuid">09:00 10:00</div>"#;
        assert!(extract_candidates(html).is_empty());
    }

    #[test]
    fn click_script_quotes_target() {
        let script = click_card_script("06:10");
        assert!(script.contains(r#"const target = "06:10";"#));
        assert!(script.contains("{36}"));
        assert!(script.contains(r"\d{2}:\d{2}"));

        let hostile = click_card_script("\"; alert(1); \"");
        assert!(hostile.contains(r#"const target = "\"; alert(1); \"";"#));
    }
}
