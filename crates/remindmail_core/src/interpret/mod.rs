//! Free-text reminder interpretation.
//!
//! # Responsibility
//! - Turn text like "remind me to call mom tomorrow" into a proposed `Rule`.
//!
//! # Invariants
//! - No I/O and no clock reads: "now" is always passed in.
//! - The result is a proposal; nothing here persists it.
//! - Failures carry the original text so callers can re-prompt.

use crate::model::rule::{notes_separator, Rule, RuleKey};
use crate::schedule::offset::{offset_for, EpochUnit};
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod phrase;

use phrase::{find_phrase, When};

/// Hours before this belong to the previous calendar day.
pub const DEFAULT_DAY_STARTS_AT_HOUR: u32 = 3;

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)#([\w-]+)").expect("valid tag regex"));
static LEADING_FILLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:remind\b\s*)?(?:me\b\s*)?(?:to\b\s*)?").expect("valid filler regex")
});
static LEADING_CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:(?:on|at|by|to|in)\b\s*)+").expect("valid leading connector regex")
});
static TRAILING_CONNECTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\s+(?:on|at|by|to|in))+$").expect("valid trailing connector regex")
});
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Why a text could not be turned into a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretationFailure {
    Empty,
    /// Nothing is left once the temporal phrase and filler are removed.
    MissingTitle,
    /// A date-like phrase names no real date.
    InvalidDate(String),
    /// An explicit year puts the date before today.
    PastDate(NaiveDate),
    /// "every 0 days" and friends.
    ZeroPeriod,
    /// No temporal phrase where one is required.
    Unrecognized,
}

/// Interpretation failure carrying the text that caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretationError {
    pub text: String,
    pub failure: InterpretationFailure,
}

impl Display for InterpretationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not interpret `{}`: ", self.text)?;
        match &self.failure {
            InterpretationFailure::Empty => write!(f, "nothing to remind about"),
            InterpretationFailure::MissingTitle => write!(f, "no reminder title left"),
            InterpretationFailure::InvalidDate(phrase) => write!(f, "`{phrase}` is not a date"),
            InterpretationFailure::PastDate(date) => {
                write!(f, "{} is in the past", date.format("%Y-%m-%d"))
            }
            InterpretationFailure::ZeroPeriod => write!(f, "period must be at least 1"),
            InterpretationFailure::Unrecognized => write!(f, "no date or recurrence recognized"),
        }
    }
}

impl Error for InterpretationError {}

/// Maps free text to proposed rules.
#[derive(Debug, Clone, Copy)]
pub struct Interpreter {
    day_starts_at_hour: u32,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(DEFAULT_DAY_STARTS_AT_HOUR)
    }
}

impl Interpreter {
    pub fn new(day_starts_at_hour: u32) -> Self {
        Self {
            day_starts_at_hour: day_starts_at_hour.min(23),
        }
    }

    /// Calendar day that `now` counts as.
    pub fn effective_today(&self, now: NaiveDateTime) -> NaiveDate {
        if now.hour() < self.day_starts_at_hour {
            now.date() - Duration::days(1)
        } else {
            now.date()
        }
    }

    /// Interprets one sentence holding both the title and the time.
    ///
    /// Text with no temporal phrase becomes a `Now` rule.
    pub fn interpret(&self, text: &str, now: NaiveDateTime) -> Result<Rule, InterpretationError> {
        let fail = |failure| InterpretationError {
            text: text.to_string(),
            failure,
        };
        let parts = split_parts(text).ok_or_else(|| fail(InterpretationFailure::Empty))?;
        let today = self.effective_today(now);

        let (when, title) = match find_phrase(&parts.body, today).map_err(fail)? {
            Some(found) => {
                let before = &parts.body[..found.span.start];
                let after = &parts.body[found.span.end..];
                (found.when, clean_title(longer_fragment(before, after)))
            }
            None => (When::Now, clean_title(&parts.body)),
        };
        if title.is_empty() {
            return Err(fail(InterpretationFailure::MissingTitle));
        }

        let rule = build_rule(when, today, title).map_err(fail)?;
        Ok(rule.with_notes(parts.notes).with_tags(parts.tags))
    }

    /// Interprets a time-only phrase for an already known title.
    ///
    /// Unlike `interpret`, an unrecognized phrase is an error.
    pub fn interpret_when(
        &self,
        title: &str,
        when: &str,
        now: NaiveDateTime,
    ) -> Result<Rule, InterpretationError> {
        let fail = |failure| InterpretationError {
            text: when.to_string(),
            failure,
        };
        let parts = split_parts(title).ok_or_else(|| fail(InterpretationFailure::MissingTitle))?;
        let title = WHITESPACE_RE.replace_all(parts.body.trim(), " ").to_string();
        if title.is_empty() {
            return Err(fail(InterpretationFailure::MissingTitle));
        }
        if when.trim().is_empty() {
            return Err(fail(InterpretationFailure::Empty));
        }

        let today = self.effective_today(now);
        let found = find_phrase(when, today)
            .map_err(fail)?
            .ok_or_else(|| fail(InterpretationFailure::Unrecognized))?;
        let rule = build_rule(found.when, today, title).map_err(fail)?;
        Ok(rule.with_notes(parts.notes).with_tags(parts.tags))
    }
}

/// `Interpreter::default().interpret(text, now)`.
pub fn interpret(text: &str, now: NaiveDateTime) -> Result<Rule, InterpretationError> {
    Interpreter::default().interpret(text, now)
}

struct Parts {
    body: String,
    notes: String,
    tags: Vec<String>,
}

/// Splits `body #tags: notes`; `None` for blank input.
///
/// Only a `:` followed by whitespace starts notes, as in the bracket store.
fn split_parts(text: &str) -> Option<Parts> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (body, notes) = match notes_separator(text) {
        Some(index) => (&text[..index], text[index + 1..].trim()),
        None => (text, ""),
    };
    let tags = TAG_RE
        .captures_iter(body)
        .map(|caps| caps[1].to_string())
        .collect();
    let body = TAG_RE.replace_all(body, " ").to_string();
    Some(Parts {
        body,
        notes: notes.to_string(),
        tags,
    })
}

/// The longer side of a split, by visible characters.
fn longer_fragment<'a>(before: &'a str, after: &'a str) -> &'a str {
    if after.trim().chars().count() > before.trim().chars().count() {
        after
    } else {
        before
    }
}

fn clean_title(fragment: &str) -> String {
    let mut title = WHITESPACE_RE
        .replace_all(fragment.trim(), " ")
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string();
    title = TRAILING_CONNECTOR_RE.replace(&title, "").to_string();
    title = LEADING_CONNECTOR_RE.replace(&title, "").to_string();
    title = LEADING_FILLER_RE.replace(&title, "").to_string();
    title = LEADING_CONNECTOR_RE.replace(&title, "").to_string();
    title
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

fn build_rule(
    when: When,
    today: NaiveDate,
    title: String,
) -> Result<Rule, InterpretationFailure> {
    let rule = match when {
        When::Every { unit, n } => {
            let key = match unit {
                EpochUnit::Day => RuleKey::Day,
                EpochUnit::Week => RuleKey::Week,
                EpochUnit::Month => RuleKey::Month,
            };
            Rule::periodic(key, n, offset_for(unit, today, n), title)
        }
        When::EveryWeekday { weekday, n } => {
            Rule::on_weekday(weekday, n, offset_for(EpochUnit::Week, today, n), title)
        }
        When::MonthDay(day) => Rule::on_day_of_month(day, title),
        When::On(date) if date == today => Rule::new(RuleKey::Now, title),
        When::On(date) if date < today => {
            return Err(InterpretationFailure::PastDate(date));
        }
        When::On(date) => Rule::on_date(date, title),
        When::Later => Rule::new(RuleKey::Later, title),
        When::Now => Rule::new(RuleKey::Now, title),
    };
    Ok(rule)
}
