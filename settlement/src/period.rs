//! Billing periods

use crate::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed-open date range `[start, end)` over which fees are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    start: NaiveDate,
    end: NaiveDate,
}

impl BillingPeriod {
    /// Arbitrary period; `end == start` is an empty period
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if end < start {
            return Err(Error::InvalidBillingPeriod { start, end });
        }
        Ok(Self { start, end })
    }

    /// Calendar month
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| Error::Config(format!("Invalid month {}-{:02}", year, month)))?;
        Self::month_starting(start)
    }

    /// Calendar month containing `date`
    pub fn containing(date: NaiveDate) -> Result<Self> {
        Self::month(date.year(), date.month())
    }

    fn month_starting(start: NaiveDate) -> Result<Self> {
        let end = start
            .checked_add_months(Months::new(1))
            .ok_or_else(|| Error::Calculation(format!("No month after {}", start)))?;
        Ok(Self { start, end })
    }

    /// First day (inclusive)
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Day after the last day (exclusive)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Last day (inclusive), `None` for an empty period
    pub fn last_day(&self) -> Option<NaiveDate> {
        if self.is_empty() {
            None
        } else {
            self.end.pred_opt()
        }
    }

    /// No days in range
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Number of days in range
    pub fn days(&self) -> u32 {
        (self.end - self.start).num_days() as u32
    }

    /// Whether `date` falls within `[start, end)`
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Whether a timestamp's UTC date falls in the period
    pub fn contains_timestamp(&self, at: DateTime<Utc>) -> bool {
        self.contains(at.date_naive())
    }

    /// Length of the calendar month containing `start`
    pub fn days_in_start_month(&self) -> Result<u32> {
        let first = self
            .start
            .with_day(1)
            .ok_or_else(|| Error::Calculation(format!("No first day for {}", self.start)))?;
        Ok(Self::month_starting(first)?.days())
    }

    /// Following calendar month
    ///
    /// Defined for month periods; for arbitrary ranges it is the month after
    /// the one containing `end - 1`.
    pub fn next(&self) -> Result<Self> {
        let anchor = self.last_day().unwrap_or(self.start);
        let following = anchor
            .with_day(1)
            .and_then(|d| d.checked_add_months(Months::new(1)))
            .ok_or_else(|| Error::Calculation(format!("No month after {}", anchor)))?;
        Self::month_starting(following)
    }

    /// Calendar months from the one containing `first` through the one containing `last`
    pub fn months_between(first: NaiveDate, last: NaiveDate) -> Result<Vec<Self>> {
        let mut periods = Vec::new();
        if last < first {
            return Ok(periods);
        }

        let mut period = Self::containing(first)?;
        while period.start <= last {
            periods.push(period);
            period = period.next()?;
        }
        Ok(periods)
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_bounds() {
        let feb = BillingPeriod::month(2024, 2).unwrap();
        assert_eq!(feb.start(), date(2024, 2, 1));
        assert_eq!(feb.end(), date(2024, 3, 1));
        assert_eq!(feb.days(), 29);
        assert_eq!(feb.last_day(), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_inverted_period_rejected() {
        let err = BillingPeriod::new(date(2024, 3, 1), date(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, Error::InvalidBillingPeriod { .. }));
        assert!(BillingPeriod::new(date(2024, 3, 1), date(2024, 3, 1))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_contains_is_closed_open() {
        let jan = BillingPeriod::month(2024, 1).unwrap();
        assert!(jan.contains(date(2024, 1, 1)));
        assert!(jan.contains(date(2024, 1, 31)));
        assert!(!jan.contains(date(2024, 2, 1)));
    }

    #[test]
    fn test_days_in_start_month_for_custom_range() {
        let period = BillingPeriod::new(date(2024, 1, 15), date(2024, 2, 15)).unwrap();
        assert_eq!(period.days_in_start_month().unwrap(), 31);
        assert_eq!(period.next().unwrap(), BillingPeriod::month(2024, 3).unwrap());
    }

    #[test]
    fn test_months_between_crosses_year() {
        let months = BillingPeriod::months_between(date(2023, 11, 20), date(2024, 2, 3)).unwrap();
        let starts: Vec<_> = months.iter().map(|p| p.start()).collect();
        assert_eq!(
            starts,
            vec![date(2023, 11, 1), date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]
        );
        assert!(BillingPeriod::months_between(date(2024, 2, 1), date(2024, 1, 1))
            .unwrap()
            .is_empty());
    }
}
