//! Wall-clock times as printed on the booking site.
//!
//! The results list shows departure and arrival as bare "HH:MM" strings with
//! no date attached. Journeys that run past midnight therefore show an
//! arrival that is numerically earlier than the departure; durations are
//! computed modulo 24 hours.

use std::fmt;

use chrono::NaiveTime;

/// Minutes in one day.
const MINUTES_PER_DAY: u16 = 24 * 60;

/// Error returned when parsing an invalid time string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// A time of day with minute precision.
///
/// # Examples
///
/// ```
/// use fare_scraper::domain::ClockTime;
///
/// let t = ClockTime::parse_hhmm("06:05").unwrap();
/// assert_eq!(t.hour(), 6);
/// assert_eq!(t.minute(), 5);
/// assert_eq!(t.to_string(), "06:05");
///
/// assert!(ClockTime::parse_hhmm("6:05").is_err());
/// assert!(ClockTime::parse_hhmm("24:00").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    minutes: u16,
}

impl ClockTime {
    /// Build a time from hour and minute components.
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self {
            minutes: (hour * 60 + minute) as u16,
        })
    }

    /// Parse a time from strict "HH:MM" format.
    pub fn parse_hhmm(s: &str) -> Result<Self, TimeError> {
        if s.len() != 5 {
            return Err(TimeError::new("expected HH:MM format"));
        }

        let bytes = s.as_bytes();
        if bytes[2] != b':' {
            return Err(TimeError::new("expected colon at position 2"));
        }

        let hour =
            parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
        if hour > 23 {
            return Err(TimeError::new("hour must be 0-23"));
        }

        let minute = parse_two_digits(&bytes[3..5])
            .ok_or_else(|| TimeError::new("invalid minute digits"))?;
        if minute > 59 {
            return Err(TimeError::new("minute must be 0-59"));
        }

        Self::from_hm(hour, minute).ok_or_else(|| TimeError::new("invalid time"))
    }

    /// Returns the hour (0-23).
    pub fn hour(&self) -> u32 {
        u32::from(self.minutes / 60)
    }

    /// Returns the minute (0-59).
    pub fn minute(&self) -> u32 {
        u32::from(self.minutes % 60)
    }

    /// Minutes elapsed since midnight.
    pub fn minutes_from_midnight(&self) -> u16 {
        self.minutes
    }

    /// Converts to a chrono time.
    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }

    /// Minutes from `self` until `later`, wrapping past midnight when
    /// `later` is numerically earlier.
    pub fn minutes_until(&self, later: ClockTime) -> u16 {
        let mut end = later.minutes;
        if end < self.minutes {
            end += MINUTES_PER_DAY;
        }
        end - self.minutes
    }
}

impl fmt::Debug for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClockTime({:02}:{:02})", self.hour(), self.minute())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// Format a journey length as the site does: "4 h" or "2 h 35 min".
pub fn format_duration(minutes: u16) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;
    if mins == 0 {
        format!("{hours} h")
    } else {
        format!("{hours} h {mins} min")
    }
}

/// Compute the displayed duration between two "HH:MM" strings.
///
/// Returns an empty string when either side is missing or malformed.
///
/// # Examples
///
/// ```
/// use fare_scraper::domain::duration_between;
///
/// assert_eq!(duration_between("08:00", "12:00"), "4 h");
/// assert_eq!(duration_between("23:50", "00:20"), "0 h 30 min");
/// assert_eq!(duration_between("", "12:00"), "");
/// ```
pub fn duration_between(departure: &str, arrival: &str) -> String {
    match (
        ClockTime::parse_hhmm(departure),
        ClockTime::parse_hhmm(arrival),
    ) {
        (Ok(dep), Ok(arr)) => format_duration(dep.minutes_until(arr)),
        _ => String::new(),
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}
