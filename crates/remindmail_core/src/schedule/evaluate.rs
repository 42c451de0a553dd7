//! Rule evaluation against a calendar date.
//!
//! # Responsibility
//! - Decide whether a rule fires on a target date (`evaluate`).
//! - Report late catch-up for dated rules whose day already passed.
//!
//! # Invariants
//! - `evaluate` and `evaluate_match` never mutate the rule.
//! - `annotate_late` is the only place a rule is changed, and it only
//!   touches `notes`.
//! - A one-shot dated rule in the past still fires ("late catch-up") rather
//!   than being dropped silently. A dated rule that is not one-shot only
//!   fires on its day, so it cannot fire late on every later run.

use crate::model::rule::{
    DateSpec, Rule, RuleValidationError, Schedule, SourcePosition, LATE_NOTE_PREFIX, WEEK_ANCHOR,
};
use crate::schedule::offset::{is_aligned, EpochUnit};
use chrono::{Datelike, NaiveDate};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of evaluating one rule on one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    No,
    OnTime,
    /// Dated rule whose day passed without it being sent.
    Late { scheduled: NaiveDate },
}

impl Match {
    pub fn fires(self) -> bool {
        !matches!(self, Self::No)
    }
}

/// A rule that cannot be evaluated because its fields do not fit its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationError {
    pub title: String,
    pub position: Option<SourcePosition>,
    pub error: RuleValidationError,
}

impl Display for EvaluationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(position) => write!(f, "rule `{}` ({position}): {}", self.title, self.error),
            None => write!(f, "rule `{}`: {}", self.title, self.error),
        }
    }
}

impl Error for EvaluationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

/// Whether `rule` fires on `target`.
///
/// # Errors
/// Returns `EvaluationError` when the rule's value/frequency is missing or
/// malformed for its key.
pub fn evaluate(rule: &Rule, target: NaiveDate) -> Result<bool, EvaluationError> {
    evaluate_match(rule, target).map(Match::fires)
}

/// Like `evaluate`, but distinguishes on-time from late matches.
pub fn evaluate_match(rule: &Rule, target: NaiveDate) -> Result<Match, EvaluationError> {
    let schedule = rule.schedule().map_err(|error| EvaluationError {
        title: rule.title.clone(),
        position: rule.source,
        error,
    })?;
    match match_schedule(&schedule, target) {
        Match::Late { .. } if !rule.delete_after_send => Ok(Match::No),
        outcome => Ok(outcome),
    }
}

/// Evaluates and, for late matches, appends the "scheduled in the past" note.
pub fn evaluate_and_annotate(rule: &mut Rule, target: NaiveDate) -> Result<Match, EvaluationError> {
    let outcome = evaluate_match(rule, target)?;
    if let Match::Late { scheduled } = outcome {
        annotate_late(rule, scheduled);
    }
    Ok(outcome)
}

/// Appends the late note once; repeated calls are no-ops.
pub fn annotate_late(rule: &mut Rule, scheduled: NaiveDate) {
    let note = format!("{LATE_NOTE_PREFIX} {}.", scheduled.format("%Y-%m-%d"));
    if !rule.notes.lines().any(|line| line == note) {
        rule.push_note(&note);
    }
}

/// Evaluates an already-validated schedule.
pub fn match_schedule(schedule: &Schedule, target: NaiveDate) -> Match {
    let fires = match *schedule {
        Schedule::Date(DateSpec::Exact(date)) => {
            if date < target {
                return Match::Late { scheduled: date };
            }
            date == target
        }
        Schedule::Date(spec @ DateSpec::Annual { .. }) => {
            spec.next_on_or_after(target) == Some(target)
        }
        Schedule::DayOfMonth(day) => target.day() == day,
        Schedule::DayOfWeek { weekday, period } => {
            target.weekday() == weekday
                && is_aligned(EpochUnit::Week, target, period.frequency, period.offset)
        }
        Schedule::Day(period) => {
            is_aligned(EpochUnit::Day, target, period.frequency, period.offset)
        }
        Schedule::Week(period) => {
            target.weekday() == WEEK_ANCHOR
                && is_aligned(EpochUnit::Week, target, period.frequency, period.offset)
        }
        Schedule::Month(period) => {
            target.day() == 1
                && is_aligned(EpochUnit::Month, target, period.frequency, period.offset)
        }
        Schedule::Later => false,
        Schedule::Now => true,
    };

    if fires {
        Match::OnTime
    } else {
        Match::No
    }
}
