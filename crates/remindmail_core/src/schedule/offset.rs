//! Epoch ordinal arithmetic.
//!
//! All ordinals count from 1970-01-01. Weeks are `epoch_day / 7` (floored),
//! so they start on Thursdays; that is what stored offsets were computed
//! against and must not change.

use crate::model::rule::RuleKey;
use chrono::{Datelike, NaiveDate};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// `NaiveDate::num_days_from_ce()` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i64 = 719_163;

/// Unit an epoch ordinal is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EpochUnit {
    Day,
    Week,
    Month,
}

impl EpochUnit {
    /// Unit whose ordinal drives the modulo test for `key`, if any.
    pub fn for_key(key: RuleKey) -> Option<Self> {
        match key {
            RuleKey::Day => Some(Self::Day),
            RuleKey::Week | RuleKey::DayOfWeek => Some(Self::Week),
            RuleKey::Month => Some(Self::Month),
            RuleKey::Date | RuleKey::DayOfMonth | RuleKey::Later | RuleKey::Now => None,
        }
    }

    /// Bracket-store token (`d`, `w`, `m`).
    pub fn token(self) -> &'static str {
        match self {
            Self::Day => "d",
            Self::Week => "w",
            Self::Month => "m",
        }
    }
}

impl Display for EpochUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Day => write!(f, "day"),
            Self::Week => write!(f, "week"),
            Self::Month => write!(f, "month"),
        }
    }
}

impl FromStr for EpochUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "d" | "day" | "days" => Ok(Self::Day),
            "w" | "week" | "weeks" => Ok(Self::Week),
            "m" | "month" | "months" => Ok(Self::Month),
            other => Err(format!("unsupported unit `{other}`; expected day|week|month")),
        }
    }
}

/// Days since 1970-01-01 (negative before).
pub fn epoch_day(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAYS_FROM_CE
}

/// Floored `epoch_day / 7`.
pub fn epoch_week(date: NaiveDate) -> i64 {
    epoch_day(date).div_euclid(7)
}

/// `(year - 1970) * 12 + month`, with 1-based months.
pub fn epoch_month(date: NaiveDate) -> i64 {
    (i64::from(date.year()) - 1970) * 12 + i64::from(date.month())
}

pub fn epoch_ordinal(unit: EpochUnit, date: NaiveDate) -> i64 {
    match unit {
        EpochUnit::Day => epoch_day(date),
        EpochUnit::Week => epoch_week(date),
        EpochUnit::Month => epoch_month(date),
    }
}

/// Offset that makes an every-`n`-units rule fire on `date`.
///
/// Always in `0..n`. `n == 0` is treated as 1 ("every single unit").
pub fn offset_for(unit: EpochUnit, date: NaiveDate, n: u32) -> i64 {
    epoch_ordinal(unit, date).rem_euclid(i64::from(n.max(1)))
}

/// Whether `(epoch_unit(date) - offset) mod frequency == 0`.
pub fn is_aligned(unit: EpochUnit, date: NaiveDate, frequency: u32, offset: i64) -> bool {
    let frequency = i64::from(frequency.max(1));
    offset_for(unit, date, frequency as u32) == offset.rem_euclid(frequency)
}
