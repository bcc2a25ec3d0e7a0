//! Date handling for schedule notes
//!
//! Two directions:
//! - A note file name (`2024-06-01.txt`) maps to the calendar date it covers.
//! - A free-form query ("what's on next week?", "다음주 일정") maps to an
//!   inclusive date range used to prefilter retrieval.
//!
//! Query rules are checked in a fixed order and the first match wins. The
//! query is lowercased and all whitespace is removed before matching, so
//! "next week" and "nextweek" behave the same.

use crate::error::{Error, Result};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Canonical on-disk date format
pub const DATE_FORMAT: &str = "%Y-%m-%d";

fn date_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"20\d{2}-\d{2}-\d{2}").unwrap())
}

fn days_forward_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:(\d+)days?(?:later|after|fromnow)|in(\d+)days?|(\d+)일(?:뒤|후))").unwrap()
    })
}

fn days_back_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:(\d+)days?ago|(\d+)일전)").unwrap())
}

/// An inclusive date range. Both bounds are set or neither is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self::new(day, day)
    }

    /// No date was detected
    pub fn none() -> Self {
        Self::default()
    }

    /// Both bounds, if the range was detected
    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.start?, self.end?))
    }

    pub fn is_bounded(&self) -> bool {
        self.bounds().is_some()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.bounds()
            .is_some_and(|(start, end)| start <= day && day <= end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds() {
            Some((start, end)) if start == end => write!(f, "{}", start.format(DATE_FORMAT)),
            Some((start, end)) => write!(
                f,
                "{} ~ {}",
                start.format(DATE_FORMAT),
                end.format(DATE_FORMAT)
            ),
            None => write!(f, "(none)"),
        }
    }
}

/// Values substituted into the system prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TodayContext {
    /// Today, `YYYY-MM-DD`
    pub today: String,
    /// English weekday name of today
    pub weekday: String,
    /// Tomorrow, `YYYY-MM-DD`
    pub tomorrow: String,
    /// Nearest Friday on or after today, `YYYY-MM-DD`
    pub friday: String,
}

impl TodayContext {
    pub fn new(today: NaiveDate) -> Self {
        let until_friday = (Weekday::Fri.num_days_from_monday() + 7
            - today.weekday().num_days_from_monday())
            % 7;
        let friday = today
            .checked_add_days(Days::new(until_friday as u64))
            .unwrap_or(today);
        let tomorrow = today.succ_opt().unwrap_or(today);

        Self {
            today: today.format(DATE_FORMAT).to_string(),
            weekday: today.format("%A").to_string(),
            tomorrow: tomorrow.format(DATE_FORMAT).to_string(),
            friday: friday.format(DATE_FORMAT).to_string(),
        }
    }
}

/// Parse a `YYYY-MM-DD` date string, rejecting anything that is not a real calendar date
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT).map_err(|_| Error::InvalidDate(trimmed.to_string()))
}

/// Date covered by a note file, taken from its file-name component
pub fn extract_date_from_filename(path: &str) -> Option<NaiveDate> {
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    first_valid_date(name)
}

fn first_valid_date(text: &str) -> Option<NaiveDate> {
    date_pattern()
        .find_iter(text)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), DATE_FORMAT).ok())
}

/// Resolve the date range a query talks about, relative to `today`
pub fn resolve_range(query: &str, today: NaiveDate) -> DateRange {
    let q: String = query
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    match detect(&q, today) {
        Some((start, end)) => DateRange::new(start, end),
        None => DateRange::none(),
    }
}

fn detect(q: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    if let Some(day) = first_valid_date(q) {
        return Some((day, day));
    }

    if let Some(day) = relative_day(q, today) {
        return Some((day, day));
    }

    if let Some(day) = day_offset(q, today) {
        return Some((day, day));
    }

    let monday = week_start(today)?;

    if has_any(q, &["thisweekend", "이번주주말"]) {
        return weekend_of(monday);
    }
    if has_any(q, &["nextweekend", "다음주주말"]) {
        return weekend_of(monday.checked_add_days(Days::new(7))?);
    }

    if has_week(q, &["weekafternext", "다다음주"]) {
        return whole_week(monday.checked_add_days(Days::new(14))?);
    }
    if has_week(q, &["nextweek", "다음주"]) {
        return whole_week(monday.checked_add_days(Days::new(7))?);
    }
    if has_week(q, &["thisweek", "이번주"]) {
        return whole_week(monday);
    }

    if has_any(q, &["thismonth", "이번달"]) {
        return whole_month(today.with_day(1)?);
    }
    if has_any(q, &["nextmonth", "다음달"]) {
        return whole_month(today.with_day(1)?.checked_add_months(Months::new(1))?);
    }

    if has_any(q, &["weekday", "평일"]) {
        return Some((monday, monday.checked_add_days(Days::new(4))?));
    }
    if has_any(q, &["weekend", "주말"]) {
        return weekend_of(monday);
    }

    None
}

fn has_any(q: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| q.contains(k))
}

/// Like `has_any`, but "thisweekday" is a weekday phrase, not a week one
fn has_week(q: &str, keywords: &[&str]) -> bool {
    keywords
        .iter()
        .any(|k| q.match_indices(k).any(|(i, _)| !q[i + k.len()..].starts_with("day")))
}

fn relative_day(q: &str, today: NaiveDate) -> Option<NaiveDate> {
    // "dayaftertomorrow" contains "tomorrow"
    if has_any(q, &["dayaftertomorrow", "모레"]) {
        return today.checked_add_days(Days::new(2));
    }
    if has_any(q, &["today", "오늘"]) {
        return Some(today);
    }
    if has_any(q, &["tomorrow", "내일"]) {
        return today.checked_add_days(Days::new(1));
    }
    None
}

fn day_offset(q: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(caps) = days_forward_pattern().captures(q) {
        let n = caps
            .iter()
            .skip(1)
            .flatten()
            .next()?
            .as_str()
            .parse::<u64>()
            .ok()?;
        return today.checked_add_days(Days::new(n));
    }

    if let Some(caps) = days_back_pattern().captures(q) {
        let n = caps
            .iter()
            .skip(1)
            .flatten()
            .next()?
            .as_str()
            .parse::<u64>()
            .ok()?;
        return today.checked_sub_days(Days::new(n));
    }

    None
}

fn week_start(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(day.weekday().num_days_from_monday() as u64))
}

fn whole_week(monday: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    Some((monday, monday.checked_add_days(Days::new(6))?))
}

fn weekend_of(monday: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        monday.checked_add_days(Days::new(5))?,
        monday.checked_add_days(Days::new(6))?,
    ))
}

fn whole_month(first: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // Wednesday
    fn today() -> NaiveDate {
        d(2024, 6, 12)
    }

    fn range(query: &str) -> DateRange {
        resolve_range(query, today())
    }

    #[test]
    fn test_filename_date() {
        assert_eq!(
            extract_date_from_filename("/home/me/notes/2024-06-01.txt"),
            Some(d(2024, 6, 1))
        );
        assert_eq!(
            extract_date_from_filename(r"C:\notes\2024-06-01.md"),
            Some(d(2024, 6, 1))
        );
        assert_eq!(extract_date_from_filename("/notes/todo.txt"), None);
        assert_eq!(extract_date_from_filename("/notes/2024-02-30.txt"), None);
        // Directory components are ignored
        assert_eq!(
            extract_date_from_filename("/archive/2023-01-01/ideas.txt"),
            None
        );
    }

    #[test]
    fn test_literal_date_wins() {
        assert_eq!(
            range("what about 2024-07-04 and tomorrow"),
            DateRange::single(d(2024, 7, 4))
        );
        // Invalid literal falls through to the remaining rules
        assert_eq!(range("2024-13-45 tomorrow"), DateRange::single(d(2024, 6, 13)));
    }

    #[test]
    fn test_relative_days() {
        assert_eq!(range("What do I have today?"), DateRange::single(today()));
        assert_eq!(range("tomorrow"), DateRange::single(d(2024, 6, 13)));
        assert_eq!(
            range("the day after tomorrow"),
            DateRange::single(d(2024, 6, 14))
        );
        assert_eq!(range("오늘 일정"), DateRange::single(today()));
        assert_eq!(range("내일 뭐 있어"), DateRange::single(d(2024, 6, 13)));
        assert_eq!(range("모레"), DateRange::single(d(2024, 6, 14)));
    }

    #[test]
    fn test_day_offsets() {
        assert_eq!(range("3 days later"), DateRange::single(d(2024, 6, 15)));
        assert_eq!(range("in 10 days"), DateRange::single(d(2024, 6, 22)));
        assert_eq!(range("1 day from now"), DateRange::single(d(2024, 6, 13)));
        assert_eq!(range("2 days ago"), DateRange::single(d(2024, 6, 10)));
        assert_eq!(range("3일 뒤"), DateRange::single(d(2024, 6, 15)));
        assert_eq!(range("5일후"), DateRange::single(d(2024, 6, 17)));
        assert_eq!(range("20일 전"), DateRange::single(d(2024, 5, 23)));
    }

    #[test]
    fn test_weeks() {
        assert_eq!(range("this week"), DateRange::new(d(2024, 6, 10), d(2024, 6, 16)));
        assert_eq!(range("next week"), DateRange::new(d(2024, 6, 17), d(2024, 6, 23)));
        assert_eq!(
            range("the week after next"),
            DateRange::new(d(2024, 6, 24), d(2024, 6, 30))
        );
        assert_eq!(range("이번주"), DateRange::new(d(2024, 6, 10), d(2024, 6, 16)));
        assert_eq!(range("다음주 일정"), DateRange::new(d(2024, 6, 17), d(2024, 6, 23)));
        assert_eq!(range("다다음주"), DateRange::new(d(2024, 6, 24), d(2024, 6, 30)));
    }

    #[test]
    fn test_weekend_of_week_beats_week() {
        assert_eq!(
            range("this weekend"),
            DateRange::new(d(2024, 6, 15), d(2024, 6, 16))
        );
        assert_eq!(
            range("next weekend"),
            DateRange::new(d(2024, 6, 22), d(2024, 6, 23))
        );
        assert_eq!(
            range("이번주 주말"),
            DateRange::new(d(2024, 6, 15), d(2024, 6, 16))
        );
        assert_eq!(
            range("다음주 주말"),
            DateRange::new(d(2024, 6, 22), d(2024, 6, 23))
        );
    }

    #[test]
    fn test_months() {
        assert_eq!(range("this month"), DateRange::new(d(2024, 6, 1), d(2024, 6, 30)));
        assert_eq!(range("다음달"), DateRange::new(d(2024, 7, 1), d(2024, 7, 31)));
        assert_eq!(
            resolve_range("이번달", d(2024, 2, 10)),
            DateRange::new(d(2024, 2, 1), d(2024, 2, 29))
        );
    }

    #[test]
    fn test_december_rolls_over() {
        let dec = d(2024, 12, 20);
        assert_eq!(
            resolve_range("this month", dec),
            DateRange::new(d(2024, 12, 1), d(2024, 12, 31))
        );
        assert_eq!(
            resolve_range("next month", dec),
            DateRange::new(d(2025, 1, 1), d(2025, 1, 31))
        );
    }

    #[test]
    fn test_weekday_and_weekend() {
        assert_eq!(range("weekdays"), DateRange::new(d(2024, 6, 10), d(2024, 6, 14)));
        assert_eq!(
            range("free this weekday?"),
            DateRange::new(d(2024, 6, 10), d(2024, 6, 14))
        );
        assert_eq!(
            range("this week and every weekday"),
            DateRange::new(d(2024, 6, 10), d(2024, 6, 16))
        );
        assert_eq!(range("평일"), DateRange::new(d(2024, 6, 10), d(2024, 6, 14)));
        assert_eq!(range("weekend"), DateRange::new(d(2024, 6, 15), d(2024, 6, 16)));
        assert_eq!(range("주말 약속"), DateRange::new(d(2024, 6, 15), d(2024, 6, 16)));
    }

    #[test]
    fn test_no_date() {
        let r = range("when is my dentist appointment?");
        assert_eq!(r, DateRange::none());
        assert!(!r.is_bounded());
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let queries = ["next week", "3일 뒤", "this weekend", "nothing here", "2024-01-02"];
        for q in queries {
            assert_eq!(resolve_range(q, today()), resolve_range(q, today()));
        }
    }

    #[test]
    fn test_today_context() {
        let ctx = TodayContext::new(today());
        assert_eq!(ctx.today, "2024-06-12");
        assert_eq!(ctx.weekday, "Wednesday");
        assert_eq!(ctx.tomorrow, "2024-06-13");
        assert_eq!(ctx.friday, "2024-06-14");

        // Friday itself counts
        assert_eq!(TodayContext::new(d(2024, 6, 14)).friday, "2024-06-14");
        assert_eq!(TodayContext::new(d(2024, 6, 15)).friday, "2024-06-21");
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date(" 2024-06-01 ").unwrap(), d(2024, 6, 1));
        assert!(matches!(parse_date("2024-02-30"), Err(Error::InvalidDate(_))));
        assert!(matches!(parse_date("next friday"), Err(Error::InvalidDate(_))));
    }

    #[test]
    fn test_range_contains_and_display() {
        let r = DateRange::new(d(2024, 6, 10), d(2024, 6, 16));
        assert!(r.contains(d(2024, 6, 10)));
        assert!(r.contains(d(2024, 6, 16)));
        assert!(!r.contains(d(2024, 6, 17)));
        assert_eq!(r.to_string(), "2024-06-10 ~ 2024-06-16");
        assert!(!DateRange::none().contains(d(2024, 6, 10)));
    }
}
