//! Departures and the fares attached to them.

use serde::{Deserialize, Serialize};

/// A departure parsed from the results list, before its detail page has
/// been visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// "HH:MM", or empty when the card carried no time
    pub departure_time: String,
    /// "HH:MM", or empty when the card carried only one time
    pub arrival_time: String,
    /// Display duration such as "4 h" or "2 h 35 min"
    pub duration: String,
    pub changes: u32,
    /// Operator label, empty when no heuristic matched
    pub operator: String,
    /// Position of the card in the list, in document order
    pub card_index: usize,
}

/// The fare classes shown on the detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FareClass {
    Second,
    SecondCalm,
    First,
}

impl FareClass {
    pub const ALL: [FareClass; 3] = [FareClass::Second, FareClass::SecondCalm, FareClass::First];

    /// The `data-testid` of the price element for this class.
    pub fn test_id(self) -> &'static str {
        match self {
            FareClass::Second => "SECOND-price",
            FareClass::SecondCalm => "SECOND_CALM-price",
            FareClass::First => "FIRST-price",
        }
    }
}

/// The price of one fare class.
///
/// An unavailable quote never carries an amount; the constructors and the
/// deserializer both enforce this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPriceQuote")]
pub struct PriceQuote {
    #[serde(rename = "price")]
    amount: Option<u32>,
    available: bool,
}

impl PriceQuote {
    pub fn available(amount: u32) -> Self {
        Self {
            amount: Some(amount),
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            amount: None,
            available: false,
        }
    }

    /// Price in whole currency units (SEK), if bookable.
    pub fn amount(&self) -> Option<u32> {
        self.amount
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

/// Wire shape of a quote, normalized into [`PriceQuote`].
#[derive(Deserialize)]
struct RawPriceQuote {
    price: Option<u32>,
    available: bool,
}

impl From<RawPriceQuote> for PriceQuote {
    fn from(raw: RawPriceQuote) -> Self {
        match (raw.price, raw.available) {
            (Some(amount), true) => PriceQuote::available(amount),
            _ => PriceQuote::unavailable(),
        }
    }
}

/// Quotes for every fare class of one departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarePrices {
    pub second_class: PriceQuote,
    pub second_class_calm: PriceQuote,
    pub first_class: PriceQuote,
}

impl FarePrices {
    pub fn unavailable() -> Self {
        Self {
            second_class: PriceQuote::unavailable(),
            second_class_calm: PriceQuote::unavailable(),
            first_class: PriceQuote::unavailable(),
        }
    }

    #[cfg(test)]
    pub fn get(&self, class: FareClass) -> PriceQuote {
        match class {
            FareClass::Second => self.second_class,
            FareClass::SecondCalm => self.second_class_calm,
            FareClass::First => self.first_class,
        }
    }
}

/// A fully enriched departure: list data plus fares and a booking link.
///
/// Cached per (route, date, departure time) and never mutated after it is
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub departure_time: String,
    pub arrival_time: String,
    pub duration: String,
    pub changes: u32,
    pub operator: String,
    pub prices: FarePrices,
    pub booking_url: String,
}

impl Departure {
    pub fn from_candidate(candidate: &Candidate, prices: FarePrices, booking_url: String) -> Self {
        Self {
            departure_time: candidate.departure_time.clone(),
            arrival_time: candidate.arrival_time.clone(),
            duration: candidate.duration.clone(),
            changes: candidate.changes,
            operator: candidate.operator.clone(),
            prices,
            booking_url,
        }
    }
}
