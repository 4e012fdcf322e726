//! `updated_at` watermark handling for incremental resources.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::error::ValidationError;

/// Watermark used when no cursor has been persisted yet.
pub const INITIAL_WATERMARK: &str = "2025-08-01T00:00:00+00:00";

/// A high-water mark that keeps the server's original text.
///
/// Comparison is by instant, so `2025-08-01T00:00:00Z` and
/// `2025-08-01T00:00:00+00:00` are the same watermark.
#[derive(Debug, Clone)]
pub struct Watermark {
    raw: String,
    at: OffsetDateTime,
}

impl Watermark {
    /// Parse RFC 3339 or an offset-less ISO date-time (read as UTC).
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let raw = value.trim();
        let at = parse_instant(raw).ok_or_else(|| ValidationError::InvalidWatermark {
            value: value.to_owned(),
        })?;
        Ok(Self {
            raw: raw.to_owned(),
            at,
        })
    }

    pub fn initial() -> Self {
        Self {
            raw: String::from(INITIAL_WATERMARK),
            at: time::macros::datetime!(2025-08-01 00:00:00 UTC),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub const fn instant(&self) -> OffsetDateTime {
        self.at
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self.at > other.at
    }
}

impl PartialEq for Watermark {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at
    }
}

impl Eq for Watermark {}

impl PartialOrd for Watermark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Watermark {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at.cmp(&other.at)
    }
}

impl Display for Watermark {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_instant(value: &str) -> Option<OffsetDateTime> {
    if let Ok(at) = OffsetDateTime::parse(value, &Rfc3339) {
        return Some(at.to_offset(UtcOffset::UTC));
    }

    let whole = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let fractional =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    PrimitiveDateTime::parse(value, &whole)
        .or_else(|_| PrimitiveDateTime::parse(value, &fractional))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Upper bound for an orders query: the top of the hour containing `now`,
/// in UTC, as `YYYY-MM-DDTHH:00:00`.
pub fn top_of_hour(now: OffsetDateTime) -> String {
    let now = now.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:00:00",
        now.year(),
        u8::from(now.month()),
        now.day(),
        now.hour()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn offset_forms_compare_as_instants() {
        let plus = Watermark::parse("2025-08-01T00:00:00+00:00").expect("parse");
        let zulu = Watermark::parse("2025-08-01T00:00:00Z").expect("parse");
        let naive = Watermark::parse("2025-08-01T00:00:00").expect("parse");
        let shifted = Watermark::parse("2025-08-01T02:00:00+02:00").expect("parse");

        assert_eq!(plus, zulu);
        assert_eq!(plus, naive);
        assert_eq!(plus, shifted);
        assert_eq!(plus, Watermark::initial());
        assert_eq!(naive.as_str(), "2025-08-01T00:00:00");
    }

    #[test]
    fn fractional_seconds_order_correctly() {
        let earlier = Watermark::parse("2025-08-03T10:15:00.250000").expect("parse");
        let later = Watermark::parse("2025-08-03T10:15:00.500000").expect("parse");
        assert!(later.is_after(&earlier));
        assert_eq!(vec![later.clone(), earlier].into_iter().max(), Some(later));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            Watermark::parse("yesterday"),
            Err(ValidationError::InvalidWatermark { .. })
        ));
    }

    #[test]
    fn upper_bound_truncates_to_utc_hour() {
        assert_eq!(
            top_of_hour(datetime!(2025-08-03 10:47:12.5 UTC)),
            "2025-08-03T10:00:00"
        );
        assert_eq!(
            top_of_hour(datetime!(2025-08-03 01:30:00 +02:00)),
            "2025-08-02T23:00:00"
        );
    }
}
