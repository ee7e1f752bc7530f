//! Banking-day calendar
//!
//! A date is a banking day iff it falls Monday–Friday and is not a configured
//! holiday. The holiday list is static for the life of a calendar value; a
//! new list means building a new calendar (see
//! [`SettlementScheduler::reload_calendar`](crate::SettlementScheduler::reload_calendar)).

use crate::{Error, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::Path;

/// Holiday file layout: `holidays = ["2024-12-25", 2025-01-01]`
#[derive(Debug, Deserialize)]
struct HolidayFile {
    #[serde(default)]
    holidays: Vec<toml::Value>,
}

/// Weekday + holiday calendar for one jurisdiction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BankingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl BankingCalendar {
    /// Calendar with the given holidays (duplicates collapse)
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Calendar from a configured list, rejecting duplicate entries
    ///
    /// A duplicate usually means two holiday sources were concatenated, so it
    /// is treated as a malformed list rather than silently collapsed.
    pub fn from_list(holidays: &[NaiveDate]) -> Result<Self> {
        let mut set = BTreeSet::new();
        for date in holidays {
            if !set.insert(*date) {
                return Err(Error::Config(format!("Duplicate holiday {}", date)));
            }
        }
        Ok(Self { holidays: set })
    }

    /// Load a TOML holiday file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let file: HolidayFile = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse holiday file {:?}: {}", path, e))
        })?;

        let dates = file
            .holidays
            .iter()
            .map(|value| {
                let text = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Datetime(dt) => dt.to_string(),
                    other => {
                        return Err(Error::Config(format!(
                            "Holiday entry {} is not a date",
                            other
                        )))
                    }
                };
                NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                    .map_err(|e| Error::Config(format!("Invalid holiday '{}': {}", text, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        let calendar = Self::from_list(&dates)?;
        tracing::info!(
            "Loaded {} holidays from {:?}",
            calendar.holidays.len(),
            path
        );
        Ok(calendar)
    }

    /// Configured holidays in ascending order
    pub fn holidays(&self) -> impl Iterator<Item = &NaiveDate> {
        self.holidays.iter()
    }

    /// Whether `date` is a configured holiday
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    /// Weekday and not a holiday
    pub fn is_banking_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// The `n`th banking day after `date`
    ///
    /// Walks forward one calendar day at a time and counts only banking days,
    /// so weekend and holiday captures roll to the next banking day. With
    /// `n == 0` the result is the first banking day on or after `date`. The
    /// result is always a banking day. `None` only if the walk runs past the
    /// last representable date.
    pub fn add_banking_days(&self, date: NaiveDate, n: u32) -> Option<NaiveDate> {
        let mut current = date;

        if n == 0 {
            while !self.is_banking_day(current) {
                current = current.succ_opt()?;
            }
            return Some(current);
        }

        let mut counted = 0;
        while counted < n {
            current = current.succ_opt()?;
            if self.is_banking_day(current) {
                counted += 1;
            }
        }
        Some(current)
    }

    /// First banking day strictly after `date`
    pub fn next_banking_day(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.add_banking_days(date, 1)
    }

    /// Number of banking days in `(from, to]`
    pub fn banking_days_between(&self, from: NaiveDate, to: NaiveDate) -> u32 {
        from.iter_days()
            .skip(1)
            .take_while(|d| *d <= to)
            .filter(|d| self.is_banking_day(*d))
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekends_are_not_banking_days() {
        let calendar = BankingCalendar::default();
        assert!(calendar.is_banking_day(date(2024, 12, 20))); // Fri
        assert!(!calendar.is_banking_day(date(2024, 12, 21))); // Sat
        assert!(!calendar.is_banking_day(date(2024, 12, 22))); // Sun
        assert!(calendar.is_banking_day(date(2024, 12, 23))); // Mon
    }

    #[test]
    fn test_holiday_skipped() {
        let calendar = BankingCalendar::new([date(2024, 12, 25)]);
        assert!(!calendar.is_banking_day(date(2024, 12, 25)));
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 24), 1),
            Some(date(2024, 12, 26))
        );
    }

    #[test]
    fn test_friday_rolls_over_weekend() {
        let calendar = BankingCalendar::default();
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 20), 1),
            Some(date(2024, 12, 23))
        );
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 20), 2),
            Some(date(2024, 12, 24))
        );
    }

    #[test]
    fn test_weekend_start_counts_from_next_banking_day() {
        let calendar = BankingCalendar::default();
        // Saturday + 1 banking day = Monday
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 21), 1),
            Some(date(2024, 12, 23))
        );
    }

    #[test]
    fn test_zero_days_rolls_forward() {
        let calendar = BankingCalendar::default();
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 21), 0),
            Some(date(2024, 12, 23))
        );
        assert_eq!(
            calendar.add_banking_days(date(2024, 12, 20), 0),
            Some(date(2024, 12, 20))
        );
    }

    #[test]
    fn test_end_of_calendar() {
        let calendar = BankingCalendar::default();
        assert_eq!(calendar.add_banking_days(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn test_banking_days_between() {
        let calendar = BankingCalendar::new([date(2024, 12, 25)]);
        // Thu 26, Fri 27, Mon 30, Tue 31
        assert_eq!(
            calendar.banking_days_between(date(2024, 12, 25), date(2024, 12, 31)),
            4
        );
        assert_eq!(
            calendar.banking_days_between(date(2024, 12, 31), date(2024, 12, 25)),
            0
        );
    }

    #[test]
    fn test_duplicate_holidays_rejected() {
        let err = BankingCalendar::from_list(&[date(2024, 12, 25), date(2024, 12, 25)]);
        assert!(matches!(err, Err(Error::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holidays.toml");
        std::fs::write(&path, "holidays = [\"2024-12-25\", 2025-01-01]\n").unwrap();

        let calendar = BankingCalendar::from_file(&path).unwrap();
        let holidays: Vec<_> = calendar.holidays().copied().collect();
        assert_eq!(holidays, vec![date(2024, 12, 25), date(2025, 1, 1)]);
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("holidays.toml");
        std::fs::write(&path, "holidays = [\"25/12/2024\"]\n").unwrap();

        assert!(matches!(
            BankingCalendar::from_file(&path),
            Err(Error::Config(_))
        ));
    }
}
