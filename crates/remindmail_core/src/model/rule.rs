//! Reminder rule model.
//!
//! # Responsibility
//! - Define the persisted/evaluated `Rule` record and its recurrence key.
//! - Resolve loosely typed stored fields into a closed `Schedule`.
//!
//! # Invariants
//! - `Date` requires a `YYYY-MM-DD` or `MM-DD` value.
//! - `DayOfMonth` requires a numeric value in `1..=31`.
//! - `DayOfWeek` requires one of seven weekday tokens.
//! - `frequency`/`offset` are ignored for `Date`, `Later` and `Now`.
//! - An absent frequency means "every single unit".

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Note appended to a dated rule that fires after its scheduled day.
pub const LATE_NOTE_PREFIX: &str = "This was scheduled to send on";

const WEEKDAY_TOKENS: [(Weekday, &str, &str); 7] = [
    (Weekday::Mon, "mon", "Monday"),
    (Weekday::Tue, "tue", "Tuesday"),
    (Weekday::Wed, "wed", "Wednesday"),
    (Weekday::Thu, "thu", "Thursday"),
    (Weekday::Fri, "fri", "Friday"),
    (Weekday::Sat, "sat", "Saturday"),
    (Weekday::Sun, "sun", "Sunday"),
];

/// Recurrence category of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKey {
    /// One calendar date, or a month-day that repeats yearly.
    Date,
    /// Every N days.
    Day,
    /// Every N weeks, on the week anchor weekday.
    Week,
    /// Every N months, on the first of the month.
    Month,
    /// A weekday, every N weeks.
    DayOfWeek,
    /// A day number of every month.
    DayOfMonth,
    /// Parked; never fires from the daily pass.
    Later,
    /// Immediate one-shot delivery; never persisted.
    Now,
}

impl RuleKey {
    /// Whether `frequency`/`offset` participate in evaluation.
    pub fn is_periodic(self) -> bool {
        matches!(self, Self::Day | Self::Week | Self::Month | Self::DayOfWeek)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::DayOfWeek => "day_of_week",
            Self::DayOfMonth => "day_of_month",
            Self::Later => "later",
            Self::Now => "now",
        }
    }
}

/// Where a rule came from in the persisted store.
///
/// Line ranges are 0-based and end-exclusive; records are list indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourcePosition {
    Lines { start: usize, end: usize },
    Record(usize),
}

impl Display for SourcePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lines { start, end } if end.saturating_sub(*start) <= 1 => {
                write!(f, "line {}", start + 1)
            }
            Self::Lines { start, end } => write!(f, "lines {}-{}", start + 1, end),
            Self::Record(index) => write!(f, "record {}", index + 1),
        }
    }
}

/// Canonical reminder record.
///
/// Scheduling fields stay loosely typed so that hand-edited stores can be
/// loaded and reported on; `schedule()` is the single typed view of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub key: RuleKey,
    /// Meaning depends on `key`: date string, weekday token or day number.
    pub value: Option<String>,
    /// Period N for periodic keys.
    pub frequency: Option<u32>,
    /// Phase shift applied before the modulo test.
    pub offset: i64,
    /// One-shot: removed from the store once delivered.
    pub delete_after_send: bool,
    /// Shell command whose output replaces `notes` as the body.
    pub command: Option<String>,
    pub title: String,
    pub notes: String,
    pub tags: BTreeSet<String>,
    #[serde(skip)]
    pub source: Option<SourcePosition>,
}

impl Rule {
    /// Creates an unscheduled rule shell for `key` with empty optional fields.
    pub fn new(key: RuleKey, title: impl Into<String>) -> Self {
        Self {
            key,
            value: None,
            frequency: None,
            offset: 0,
            delete_after_send: false,
            command: None,
            title: title.into(),
            notes: String::new(),
            tags: BTreeSet::new(),
            source: None,
        }
    }

    /// One-shot rule for a single calendar date.
    pub fn on_date(date: NaiveDate, title: impl Into<String>) -> Self {
        let mut rule = Self::new(RuleKey::Date, title);
        rule.value = Some(date.format("%Y-%m-%d").to_string());
        rule.delete_after_send = true;
        rule
    }

    /// Periodic rule (`Day`, `Week`, `Month`); a zero period is stored as 1.
    pub fn periodic(key: RuleKey, frequency: u32, offset: i64, title: impl Into<String>) -> Self {
        let mut rule = Self::new(key, title);
        rule.frequency = Some(frequency.max(1));
        rule.offset = offset;
        rule
    }

    /// Weekday rule firing every `frequency` weeks.
    pub fn on_weekday(
        weekday: Weekday,
        frequency: u32,
        offset: i64,
        title: impl Into<String>,
    ) -> Self {
        let mut rule = Self::periodic(RuleKey::DayOfWeek, frequency, offset, title);
        rule.value = Some(weekday_token(weekday).to_string());
        rule
    }

    /// Rule firing on one day number of every month.
    pub fn on_day_of_month(day: u32, title: impl Into<String>) -> Self {
        let mut rule = Self::new(RuleKey::DayOfMonth, title);
        rule.value = Some(day.to_string());
        rule
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Replaces the tag set with normalized values; blank tags are dropped.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tags = normalize_tags(tags);
        self
    }

    /// Effective period; absent means every single unit.
    pub fn period(&self) -> u32 {
        self.frequency.unwrap_or(1).max(1)
    }

    pub fn has_tag_in(&self, tags: &[String]) -> bool {
        tags.iter()
            .any(|tag| self.tags.contains(&tag.trim().to_lowercase()))
    }

    /// Appends one line to `notes`.
    pub fn push_note(&mut self, line: &str) {
        if !self.notes.is_empty() && !self.notes.ends_with('\n') {
            self.notes.push('\n');
        }
        self.notes.push_str(line);
    }

    /// Validates stored fields against the key's expected shape.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        self.schedule().map(|_| ())
    }

    /// Resolves stored fields into a typed schedule.
    ///
    /// # Errors
    /// - `MissingValue` / `InvalidValue` when `value` does not fit `key`.
    /// - `ZeroFrequency` when a periodic key stores an explicit zero period.
    pub fn schedule(&self) -> Result<Schedule, RuleValidationError> {
        let period = || -> Result<Period, RuleValidationError> {
            match self.frequency {
                Some(0) => Err(RuleValidationError::ZeroFrequency { key: self.key }),
                frequency => Ok(Period {
                    frequency: frequency.unwrap_or(1),
                    offset: self.offset,
                }),
            }
        };

        match self.key {
            RuleKey::Date => {
                let raw = self.required_value("YYYY-MM-DD or MM-DD")?;
                DateSpec::parse(raw)
                    .map(Schedule::Date)
                    .ok_or_else(|| self.invalid_value(raw, "YYYY-MM-DD or MM-DD"))
            }
            RuleKey::DayOfMonth => {
                let raw = self.required_value("a day number 1-31")?;
                match raw.trim().parse::<u32>() {
                    Ok(day) if (1..=31).contains(&day) => Ok(Schedule::DayOfMonth(day)),
                    _ => Err(self.invalid_value(raw, "a day number 1-31")),
                }
            }
            RuleKey::DayOfWeek => {
                let raw = self.required_value("one of mon|tue|wed|thu|fri|sat|sun")?;
                let weekday = parse_weekday_token(raw)
                    .ok_or_else(|| self.invalid_value(raw, "one of mon|tue|wed|thu|fri|sat|sun"))?;
                Ok(Schedule::DayOfWeek {
                    weekday,
                    period: period()?,
                })
            }
            RuleKey::Day => Ok(Schedule::Day(period()?)),
            RuleKey::Week => Ok(Schedule::Week(period()?)),
            RuleKey::Month => Ok(Schedule::Month(period()?)),
            RuleKey::Later => Ok(Schedule::Later),
            RuleKey::Now => Ok(Schedule::Now),
        }
    }

    fn required_value(&self, expected: &'static str) -> Result<&str, RuleValidationError> {
        match self.value.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Ok(raw),
            _ => Err(RuleValidationError::MissingValue {
                key: self.key,
                expected,
            }),
        }
    }

    fn invalid_value(&self, raw: &str, expected: &'static str) -> RuleValidationError {
        RuleValidationError::InvalidValue {
            key: self.key,
            value: raw.to_string(),
            expected,
        }
    }
}

/// Typed view of a rule's scheduling fields, one variant per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Date(DateSpec),
    Day(Period),
    Week(Period),
    Month(Period),
    DayOfWeek { weekday: Weekday, period: Period },
    DayOfMonth(u32),
    Later,
    Now,
}

impl Display for Schedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Date(DateSpec::Exact(date)) => write!(f, "{}", date.format("%A, %B %d, %Y")),
            Self::Date(DateSpec::Annual { month, day }) => {
                write!(f, "every year on {month:02}-{day:02}")
            }
            Self::Day(period) => write_every(f, period.frequency, "day", "days"),
            Self::Week(period) => {
                write_every(f, period.frequency, "week", "weeks")?;
                write!(f, " on {}", weekday_name(WEEK_ANCHOR))
            }
            Self::Month(period) => {
                write_every(f, period.frequency, "month", "months")?;
                write!(f, " on the 1st")
            }
            Self::DayOfWeek { weekday, period } => {
                write_every(f, period.frequency, weekday_name(*weekday), "")?;
                if period.frequency > 1 {
                    write!(f, "{}s", weekday_name(*weekday))?;
                }
                Ok(())
            }
            Self::DayOfMonth(day) => write!(f, "day {day} of every month"),
            Self::Later => write!(f, "later"),
            Self::Now => write!(f, "right now"),
        }
    }
}

fn write_every(
    f: &mut Formatter<'_>,
    frequency: u32,
    singular: &str,
    plural: &str,
) -> std::fmt::Result {
    if frequency <= 1 {
        write!(f, "every {singular}")
    } else {
        write!(f, "every {frequency} {plural}")
    }
}

/// Weekday on which `Week` rules fire.
pub const WEEK_ANCHOR: Weekday = Weekday::Sun;

/// Recurrence period and phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    /// Always >= 1.
    pub frequency: u32,
    pub offset: i64,
}

/// Parsed `Date` rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSpec {
    /// `YYYY-MM-DD`: a single day.
    Exact(NaiveDate),
    /// `MM-DD`: repeats every year.
    Annual { month: u32, day: u32 },
}

impl DateSpec {
    /// Parses `YYYY-MM-DD` or `MM-DD`; returns `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Some(Self::Exact(date));
        }

        let (month, day) = trimmed.split_once('-')?;
        if month.len() > 2 || day.len() > 2 {
            return None;
        }
        let month = month.parse::<u32>().ok()?;
        let day = day.parse::<u32>().ok()?;
        // 2000 is a leap year, so 02-29 is accepted.
        NaiveDate::from_ymd_opt(2000, month, day)?;
        Some(Self::Annual { month, day })
    }

    /// Next occurrence on or after `from`.
    pub fn next_on_or_after(&self, from: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Self::Exact(date) => (date >= from).then_some(date),
            Self::Annual { month, day } => (from.year()..=from.year() + 8)
                .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
                .find(|candidate| *candidate >= from),
        }
    }
}

/// Validation failure for a rule whose fields do not fit its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleValidationError {
    MissingValue {
        key: RuleKey,
        expected: &'static str,
    },
    InvalidValue {
        key: RuleKey,
        value: String,
        expected: &'static str,
    },
    ZeroFrequency {
        key: RuleKey,
    },
    InvalidFrequency {
        key: RuleKey,
        value: String,
    },
    InvalidOffset {
        key: RuleKey,
        value: String,
    },
}

impl Display for RuleValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingValue { key, expected } => {
                write!(f, "{} rule is missing its value (expected {expected})", key.label())
            }
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(
                f,
                "{} rule has invalid value `{value}` (expected {expected})",
                key.label()
            ),
            Self::ZeroFrequency { key } => {
                write!(f, "{} rule has a zero period (expected N >= 1)", key.label())
            }
            Self::InvalidFrequency { key, value } => write!(
                f,
                "{} rule has invalid period `{value}` (expected an integer N >= 1)",
                key.label()
            ),
            Self::InvalidOffset { key, value } => write!(
                f,
                "{} rule has invalid offset `{value}` (expected an integer)",
                key.label()
            ),
        }
    }
}

impl Error for RuleValidationError {}

/// Three-letter store token for a weekday (`mon`..`sun`).
pub fn weekday_token(weekday: Weekday) -> &'static str {
    WEEKDAY_TOKENS
        .iter()
        .find(|(day, _, _)| *day == weekday)
        .map(|(_, token, _)| *token)
        .unwrap_or("mon")
}

/// Capitalized English weekday name.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    WEEKDAY_TOKENS
        .iter()
        .find(|(day, _, _)| *day == weekday)
        .map(|(_, _, name)| *name)
        .unwrap_or("Monday")
}

/// Parses a weekday token or full name, case-insensitively.
pub fn parse_weekday_token(raw: &str) -> Option<Weekday> {
    let normalized = raw.trim().to_ascii_lowercase();
    WEEKDAY_TOKENS
        .iter()
        .find(|(_, token, name)| normalized == *token || normalized == name.to_ascii_lowercase())
        .map(|(day, _, _)| *day)
}

/// Lowercases, trims, strips a leading `#` and deduplicates tags.
pub fn normalize_tags<I, S>(tags: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tags.into_iter()
        .map(|tag| tag.as_ref().trim().trim_start_matches('#').to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}

/// Byte index of the `:` that starts inline notes: the first one followed by
/// whitespace or the end of the text, so `10:30` stays in the title.
pub fn notes_separator(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|(index, c)| {
            *c == ':'
                && text[index + 1..]
                    .chars()
                    .next()
                    .map_or(true, char::is_whitespace)
        })
        .map(|(index, _)| index)
}
