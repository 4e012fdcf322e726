use time::{Date, Duration, OffsetDateTime};

/// Inclusive date range requested from the ad-report API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportWindow {
    pub start_date: Date,
    pub end_date: Date,
}

impl ReportWindow {
    /// Days covered, counting both ends.
    pub const DAYS: i64 = 7;

    /// `[yesterday - 6, yesterday]` relative to `today`.
    pub fn ending_before(today: Date) -> Self {
        let end_date = today - Duration::days(1);
        let start_date = end_date - Duration::days(Self::DAYS - 1);
        Self {
            start_date,
            end_date,
        }
    }

    /// Window for the current UTC date.
    pub fn last_seven_days() -> Self {
        Self::ending_before(OffsetDateTime::now_utc().date())
    }

    pub fn start_iso(&self) -> String {
        iso_date(self.start_date)
    }

    pub fn end_iso(&self) -> String {
        iso_date(self.end_date)
    }
}

fn iso_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn window_ends_yesterday_and_spans_seven_days() {
        let window = ReportWindow::ending_before(date!(2025 - 03 - 10));
        assert_eq!(window.end_iso(), "2025-03-09");
        assert_eq!(window.start_iso(), "2025-03-03");
        assert_eq!((window.end_date - window.start_date).whole_days() + 1, 7);
    }

    #[test]
    fn window_crosses_month_and_year_boundaries() {
        let window = ReportWindow::ending_before(date!(2025 - 01 - 02));
        assert_eq!(window.end_iso(), "2025-01-01");
        assert_eq!(window.start_iso(), "2024-12-26");
    }
}
