//! Configuration for settlement scheduling and fees

use crate::{calendar::BankingCalendar, fees, Error, Result};
use chrono::NaiveDate;
use ledger_core::{Amount, FeeSchedule};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Settlement configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Holiday calendar source
    pub calendar: CalendarConfig,

    /// Fee schedule for vendors without their own
    pub default_fees: FeeSchedule,
}

/// Holiday calendar source
///
/// Inline holidays and the holiday file are merged; a date listed in both is
/// a duplicate and rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Inline holiday dates
    pub holidays: Vec<NaiveDate>,

    /// TOML file with a `holidays` array
    pub holiday_file: Option<PathBuf>,
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PAYOUT_*` overrides on top of the current values
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("PAYOUT_HOLIDAY_FILE") {
            self.calendar.holiday_file = Some(PathBuf::from(path));
        }

        if let Ok(list) = std::env::var("PAYOUT_HOLIDAYS") {
            self.calendar.holidays = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .map_err(|e| Error::Config(format!("Invalid holiday '{}': {}", s, e)))
                })
                .collect::<Result<Vec<_>>>()?;
        }

        if let Ok(fee) = std::env::var("PAYOUT_MONTHLY_FEE_MINOR") {
            self.default_fees.monthly_fee = Amount::from_minor(parse_env("PAYOUT_MONTHLY_FEE_MINOR", &fee)?);
        }

        if let Ok(fee) = std::env::var("PAYOUT_TRANSACTION_FEE_MINOR") {
            self.default_fees.per_transaction_fee =
                Amount::from_minor(parse_env("PAYOUT_TRANSACTION_FEE_MINOR", &fee)?);
        }

        if let Ok(rate) = std::env::var("PAYOUT_PROCESSING_RATE") {
            self.default_fees.processing_rate = Decimal::from_str(&rate).map_err(|e| {
                Error::Config(format!("Invalid PAYOUT_PROCESSING_RATE '{}': {}", rate, e))
            })?;
        }

        Ok(())
    }

    /// Reject negative fee settings
    pub fn validate(&self) -> Result<()> {
        fees::validate_schedule(&self.default_fees)
    }

    /// Build the banking calendar from inline holidays and the holiday file
    pub fn load_calendar(&self) -> Result<BankingCalendar> {
        let mut holidays = self.calendar.holidays.clone();
        if let Some(path) = &self.calendar.holiday_file {
            let from_file = BankingCalendar::from_file(path)?;
            holidays.extend(from_file.holidays().copied());
        }
        BankingCalendar::from_list(&holidays)
    }
}

fn parse_env(name: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, value, e)))
}
