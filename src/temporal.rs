//! Natural-language temporal reference parsing
//!
//! Recognizes a small fixed set of temporal phrasings in a question
//! ("yesterday", "last friday", "this week", "2 days ago") and turns them
//! into an explicit date window plus the residual question text used for
//! semantic retrieval. This is a pattern-driven recognizer, not a calendar
//! NLP engine; unrecognized phrasings leave the question untouched.
//!
//! Patterns are tried in a fixed priority order and only the first match is
//! applied; patterns do not combine.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// An inclusive time window derived from a query.
///
/// Both bounds are inclusive: the end of a full-day window is 23:59:59 of
/// that day, so an exclusive end would drop visits in the final second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemporalFilter {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TemporalFilter {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Whether a timestamp falls inside the window (inclusive at both ends).
    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t <= self.end
    }
}

static LAST_WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\blast\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b")
        .expect("static regex")
});
static YESTERDAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\byesterday\b").expect("static regex"));
static TODAY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\btoday\b").expect("static regex"));
static THIS_PERIOD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bthis\s+(week|month|year)\b").expect("static regex"));
static AGO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s+(day|week|month|year)s?\s+ago\b").expect("static regex")
});

/// Extract a temporal reference from a question.
///
/// Returns the residual question (matched phrase removed, whitespace
/// collapsed) and the date window, if any pattern matched. `now` anchors all
/// relative references.
pub fn parse_temporal_reference(question: &str, now: NaiveDateTime) -> (String, Option<TemporalFilter>) {
    if let Some(caps) = LAST_WEEKDAY_RE.captures(question) {
        if let (Some(whole), Some(day)) = (caps.get(0), caps.get(1)) {
            let weekday = parse_weekday(&day.as_str().to_ascii_lowercase());
            let filter = last_weekday_window(now, weekday);
            return (remove_range(question, whole.range()), Some(filter));
        }
    }

    if let Some(m) = YESTERDAY_RE.find(question) {
        let date = now.date() - Duration::days(1);
        return (remove_range(question, m.range()), Some(day_window(date)));
    }

    if let Some(m) = TODAY_RE.find(question) {
        return (
            remove_range(question, m.range()),
            Some(day_window(now.date())),
        );
    }

    if let Some(caps) = THIS_PERIOD_RE.captures(question) {
        if let (Some(whole), Some(period)) = (caps.get(0), caps.get(1)) {
            let filter = this_period_window(now, &period.as_str().to_ascii_lowercase());
            return (remove_range(question, whole.range()), Some(filter));
        }
    }

    if let Some(caps) = AGO_RE.captures(question) {
        if let (Some(whole), Some(count), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) {
            if let Ok(n) = count.as_str().parse::<i64>() {
                let filter = periods_ago_window(now, n, &unit.as_str().to_ascii_lowercase());
                return (remove_range(question, whole.range()), Some(filter));
            }
        }
    }

    (question.to_string(), None)
}

fn parse_weekday(name: &str) -> Weekday {
    match name {
        "monday" => Weekday::Mon,
        "tuesday" => Weekday::Tue,
        "wednesday" => Weekday::Wed,
        "thursday" => Weekday::Thu,
        "friday" => Weekday::Fri,
        "saturday" => Weekday::Sat,
        _ => Weekday::Sun,
    }
}

/// The most recent past occurrence of `weekday`, as a full-day window.
///
/// If today is the named weekday, step back a full week; "last friday" asked
/// on a Friday never means today.
fn last_weekday_window(now: NaiveDateTime, weekday: Weekday) -> TemporalFilter {
    let current = now.weekday().num_days_from_monday() as i64;
    let target = weekday.num_days_from_monday() as i64;
    let mut days_back = (current - target).rem_euclid(7);
    if days_back == 0 {
        days_back = 7;
    }
    day_window(now.date() - Duration::days(days_back))
}

fn day_window(date: NaiveDate) -> TemporalFilter {
    let (start, end) = day_bounds(date);
    TemporalFilter::new(start, end)
}

fn day_bounds(date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
    let start = date.and_time(NaiveTime::MIN);
    let end = date.and_hms_opt(23, 59, 59).unwrap_or(start);
    (start, end)
}

/// "this week/month/year": start of the current period up to the current
/// moment. The end is deliberately *now*, not the end of the period — the
/// question means "so far this period".
fn this_period_window(now: NaiveDateTime, period: &str) -> TemporalFilter {
    let start_date = match period {
        "week" => now.date() - Duration::days(now.weekday().num_days_from_monday() as i64),
        "month" => now.date().with_day(1).unwrap_or(now.date()),
        _ => NaiveDate::from_ymd_opt(now.year(), 1, 1).unwrap_or(now.date()),
    };
    TemporalFilter::new(start_date.and_time(NaiveTime::MIN), now)
}

/// "N days/weeks/months/years ago": the single calendar period N back,
/// as a full-period window.
fn periods_ago_window(now: NaiveDateTime, n: i64, unit: &str) -> TemporalFilter {
    match unit {
        "day" => day_window(now.date() - Duration::days(n)),
        "week" => {
            let monday = now.date()
                - Duration::days(now.weekday().num_days_from_monday() as i64)
                - Duration::weeks(n);
            let (start, _) = day_bounds(monday);
            let (_, end) = day_bounds(monday + Duration::days(6));
            TemporalFilter::new(start, end)
        }
        "month" => {
            let months = now.year() as i64 * 12 + now.month0() as i64 - n;
            let (year, month0) = (months.div_euclid(12), months.rem_euclid(12));
            let start_date = NaiveDate::from_ymd_opt(year as i32, month0 as u32 + 1, 1)
                .unwrap_or(now.date());
            let next_month = if month0 == 11 {
                NaiveDate::from_ymd_opt(year as i32 + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year as i32, month0 as u32 + 2, 1)
            };
            let end_date = next_month
                .map(|d| d - Duration::days(1))
                .unwrap_or(start_date);
            let (start, _) = day_bounds(start_date);
            let (_, end) = day_bounds(end_date);
            TemporalFilter::new(start, end)
        }
        _ => {
            let year = now.year() - n as i32;
            let start_date = NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(now.date());
            let end_date = NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(start_date);
            let (start, _) = day_bounds(start_date);
            let (_, end) = day_bounds(end_date);
            TemporalFilter::new(start, end)
        }
    }
}

/// Splice out the matched byte range and collapse the leftover whitespace.
/// The range comes straight from the regex match on the original string, so
/// it is always on char boundaries regardless of the question's script.
fn remove_range(question: &str, range: std::ops::Range<usize>) -> String {
    let mut residual = String::with_capacity(question.len());
    residual.push_str(&question[..range.start]);
    residual.push_str(&question[range.end..]);
    residual.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_last_friday_from_monday() {
        // 2024-06-03 is a Monday; last Friday is 2024-05-31
        let now = dt(2024, 6, 3, 14, 30, 0);
        let (residual, filter) =
            parse_temporal_reference("What is my most visited website last Friday?", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start.date(), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(filter.end.date(), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        assert_eq!(filter.start.time(), NaiveTime::MIN);
        assert_eq!(filter.end.time(), NaiveTime::from_hms_opt(23, 59, 59).unwrap());
        assert!(!residual.to_lowercase().contains("last friday"));
        assert!(residual.to_lowercase().contains("most visited website"));
    }

    #[test]
    fn test_last_weekday_same_day_steps_back_full_week() {
        // 2024-06-07 is a Friday; "last friday" must be 2024-05-31, not today
        let now = dt(2024, 6, 7, 9, 0, 0);
        let (_, filter) = parse_temporal_reference("sites from last friday", now);
        assert_eq!(
            filter.unwrap().start.date(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
    }

    #[test]
    fn test_yesterday() {
        let now = dt(2024, 6, 3, 14, 30, 0);
        let (residual, filter) =
            parse_temporal_reference("How many times did I visit GitHub yesterday?", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 6, 2, 0, 0, 0));
        assert_eq!(filter.end, dt(2024, 6, 2, 23, 59, 59));
        assert!(!residual.to_lowercase().contains("yesterday"));
        assert!(residual.to_lowercase().contains("github"));
    }

    #[test]
    fn test_today() {
        let now = dt(2024, 6, 3, 14, 30, 0);
        let (residual, filter) = parse_temporal_reference("What did I visit today?", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 6, 3, 0, 0, 0));
        assert_eq!(filter.end, dt(2024, 6, 3, 23, 59, 59));
        assert!(!residual.to_lowercase().contains("today"));
    }

    #[test]
    fn test_this_week_ends_at_current_moment() {
        let now = dt(2024, 6, 5, 16, 45, 12); // a Wednesday
        let (residual, filter) =
            parse_temporal_reference("What are my most visited sites this week?", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 6, 3, 0, 0, 0)); // Monday 00:00
        assert_eq!(filter.end, now); // so far this week, not end of week
        assert!(!residual.to_lowercase().contains("this week"));
    }

    #[test]
    fn test_this_month_and_year() {
        let now = dt(2024, 6, 15, 8, 0, 0);
        let (_, filter) = parse_temporal_reference("visits this month", now);
        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 6, 1, 0, 0, 0));
        assert_eq!(filter.end, now);

        let (_, filter) = parse_temporal_reference("visits this year", now);
        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 1, 1, 0, 0, 0));
        assert_eq!(filter.end, now);
    }

    #[test]
    fn test_days_ago_is_single_full_day() {
        let now = dt(2024, 6, 10, 12, 0, 0);
        let (residual, filter) = parse_temporal_reference("what did I read 3 days ago", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 6, 7, 0, 0, 0));
        assert_eq!(filter.end, dt(2024, 6, 7, 23, 59, 59));
        assert!(!residual.contains("3 days ago"));
    }

    #[test]
    fn test_weeks_ago_is_full_calendar_week() {
        let now = dt(2024, 6, 5, 12, 0, 0); // Wednesday
        let (_, filter) = parse_temporal_reference("articles 2 weeks ago", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2024, 5, 20, 0, 0, 0)); // Monday two weeks back
        assert_eq!(filter.end, dt(2024, 5, 26, 23, 59, 59)); // that Sunday
    }

    #[test]
    fn test_months_ago_crosses_year_boundary() {
        let now = dt(2024, 2, 15, 12, 0, 0);
        let (_, filter) = parse_temporal_reference("what did I research 3 months ago", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2023, 11, 1, 0, 0, 0));
        assert_eq!(filter.end, dt(2023, 11, 30, 23, 59, 59));
    }

    #[test]
    fn test_years_ago() {
        let now = dt(2024, 6, 10, 12, 0, 0);
        let (_, filter) = parse_temporal_reference("sites 1 year ago", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start, dt(2023, 1, 1, 0, 0, 0));
        assert_eq!(filter.end, dt(2023, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_no_temporal_reference() {
        let now = dt(2024, 6, 3, 14, 30, 0);
        let question = "What is my most visited website?";
        let (residual, filter) = parse_temporal_reference(question, now);

        assert!(filter.is_none());
        assert_eq!(residual, question);
    }

    #[test]
    fn test_first_match_wins_over_later_patterns() {
        // "last friday" (priority 1) wins over "today" appearing later
        let now = dt(2024, 6, 3, 14, 30, 0);
        let (residual, filter) =
            parse_temporal_reference("last friday or today, what did I read?", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start.date(), NaiveDate::from_ymd_opt(2024, 5, 31).unwrap());
        // only the first matching pattern is removed
        assert!(residual.to_lowercase().contains("today"));
    }

    #[test]
    fn test_non_ascii_text_around_phrase() {
        // "İ" lowercases to a longer byte sequence; removal must not rely on
        // offsets computed in a lowercased copy
        let now = dt(2024, 6, 3, 14, 30, 0);
        let (residual, filter) = parse_temporal_reference("İİ yesterday émile zola", now);

        let filter = filter.unwrap();
        assert_eq!(filter.start.date(), NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert_eq!(residual, "İİ émile zola");
    }

    #[test]
    fn test_filter_contains_is_inclusive() {
        let filter = TemporalFilter::new(dt(2024, 6, 2, 0, 0, 0), dt(2024, 6, 2, 23, 59, 59));
        assert!(filter.contains(dt(2024, 6, 2, 0, 0, 0)));
        assert!(filter.contains(dt(2024, 6, 2, 23, 59, 59)));
        assert!(!filter.contains(dt(2024, 6, 3, 0, 0, 0)));
        assert!(!filter.contains(dt(2024, 6, 1, 23, 59, 59)));
    }
}
