// src/edinet/schedule.rs
//! Candidate submission dates to query for one fiscal year.
use crate::edinet::models::FiscalYear;
use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Days before the expected disclosure date that are still searched.
const HINT_LEAD_DAYS: i64 = 7;
/// Statutory deadline for an annual report: three months after year end.
const HINT_WINDOW_MONTHS: u32 = 3;
/// Months (of the following calendar year) searched without a hint.
const FALLBACK_MONTHS: [u32; 3] = [4, 5, 6];

/// Expected disclosure timing supplied by an upstream data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureHint {
    pub disclosure_date: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone)]
enum Dates {
    Window { next: Option<NaiveDate>, end: NaiveDate },
    Fixed(std::vec::IntoIter<NaiveDate>),
}

/// Lazy sequence of dates to query. Cloning yields an independent iterator
/// that starts over from the clone point.
#[derive(Debug, Clone)]
pub struct SearchSchedule {
    dates: Dates,
}

impl SearchSchedule {
    /// Every day from a week before the hinted disclosure (but never before
    /// the period end) up to three months after the period end, capped at
    /// `today`.
    pub fn hinted(hint: &DisclosureHint, today: NaiveDate) -> Self {
        let lead = hint.disclosure_date - Duration::days(HINT_LEAD_DAYS);
        let start = lead.max(hint.period_end);
        let deadline = hint
            .period_end
            .checked_add_months(Months::new(HINT_WINDOW_MONTHS))
            .unwrap_or(NaiveDate::MAX);
        let end = deadline.min(today);
        Self { dates: Dates::Window { next: Some(start), end } }
    }

    /// Day 1, day 15 and the last day of April, May and June of `year + 1`,
    /// which is when March year-end companies file. Dates after `today` are
    /// dropped.
    pub fn fallback(year: FiscalYear, today: NaiveDate) -> Self {
        let Some(filing_year) = year.checked_add(1) else {
            return Self { dates: Dates::Fixed(Vec::new().into_iter()) };
        };
        let dates: Vec<NaiveDate> = FALLBACK_MONTHS
            .iter()
            .flat_map(|&month| month_checkpoints(filing_year, month))
            .filter(|d| *d <= today)
            .collect();
        Self { dates: Dates::Fixed(dates.into_iter()) }
    }

    /// Picks the hinted strategy when a hint is available.
    pub fn for_year(year: FiscalYear, hint: Option<&DisclosureHint>, today: NaiveDate) -> Self {
        match hint {
            Some(hint) => Self::hinted(hint, today),
            None => Self::fallback(year, today),
        }
    }
}

fn month_checkpoints(year: i32, month: u32) -> Vec<NaiveDate> {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return Vec::new();
    };
    let mut dates = vec![first];
    if let Some(mid) = NaiveDate::from_ymd_opt(year, month, 15) {
        dates.push(mid);
    }
    if let Some(last) = last_day_of_month(first) {
        dates.push(last);
    }
    dates
}

fn last_day_of_month(first: NaiveDate) -> Option<NaiveDate> {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .filter(|last| last.month() == first.month())
}

impl Iterator for SearchSchedule {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        match &mut self.dates {
            Dates::Window { next, end } => {
                let current = (*next).filter(|d| *d <= *end)?;
                *next = current.succ_opt();
                Some(current)
            }
            Dates::Fixed(iter) => iter.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn hinted_window_for_march_year_end() {
        let hint = DisclosureHint { disclosure_date: date(2024, 5, 8), period_end: date(2024, 3, 31) };
        let dates: Vec<_> = SearchSchedule::hinted(&hint, date(2025, 1, 1)).collect();
        assert_eq!(dates.first(), Some(&date(2024, 5, 1)));
        assert_eq!(dates.last(), Some(&date(2024, 6, 30)));
        assert_eq!(dates.len(), 61);
        assert!(dates.windows(2).all(|w| w[1] == w[0].succ_opt().unwrap()));
    }

    #[test]
    fn hinted_window_never_starts_before_period_end() {
        let hint = DisclosureHint { disclosure_date: date(2024, 4, 3), period_end: date(2024, 3, 31) };
        let first = SearchSchedule::hinted(&hint, date(2025, 1, 1)).next();
        assert_eq!(first, Some(date(2024, 3, 31)));
    }

    #[test]
    fn hinted_window_is_capped_at_today() {
        let hint = DisclosureHint { disclosure_date: date(2024, 5, 8), period_end: date(2024, 3, 31) };
        let today = date(2024, 5, 10);
        let dates: Vec<_> = SearchSchedule::hinted(&hint, today).collect();
        assert_eq!(dates.last(), Some(&today));
        assert!(dates.iter().all(|d| *d <= today));

        let before_window = SearchSchedule::hinted(&hint, date(2024, 4, 1));
        assert_eq!(before_window.count(), 0);
    }

    #[test]
    fn out_of_range_years_yield_no_dates() {
        let today = date(2025, 1, 1);
        assert_eq!(SearchSchedule::fallback(i32::MAX, today).count(), 0);
        assert_eq!(SearchSchedule::fallback(i32::MIN, today).count(), 0);
    }

    #[test]
    fn fallback_checkpoints() {
        let dates: Vec<_> = SearchSchedule::fallback(2023, date(2025, 1, 1)).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 4, 1), date(2024, 4, 15), date(2024, 4, 30),
                date(2024, 5, 1), date(2024, 5, 15), date(2024, 5, 31),
                date(2024, 6, 1), date(2024, 6, 15), date(2024, 6, 30),
            ]
        );
    }

    #[test]
    fn fallback_drops_future_dates() {
        let today = date(2024, 5, 20);
        let dates: Vec<_> = SearchSchedule::fallback(2023, today).collect();
        assert_eq!(dates.len(), 5);
        assert!(dates.iter().all(|d| *d <= today));
        assert_eq!(SearchSchedule::fallback(2030, today).count(), 0);
    }

    #[test]
    fn clone_restarts_from_clone_point() {
        let schedule = SearchSchedule::fallback(2023, date(2025, 1, 1));
        let first_pass: Vec<_> = schedule.clone().collect();
        let second_pass: Vec<_> = schedule.collect();
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn for_year_prefers_hint() {
        let hint = DisclosureHint { disclosure_date: date(2024, 5, 8), period_end: date(2024, 3, 31) };
        let today = date(2025, 1, 1);
        assert_eq!(SearchSchedule::for_year(2023, Some(&hint), today).count(), 61);
        assert_eq!(SearchSchedule::for_year(2023, None, today).count(), 9);
    }
}
