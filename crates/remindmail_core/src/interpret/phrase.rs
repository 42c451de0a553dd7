//! Temporal phrase recognition.
//!
//! Families are tried in a fixed order and the first hit wins:
//! recurrence, relative offsets, calendar dates, weekday references,
//! then the `later` / `now` keywords.

use crate::interpret::InterpretationFailure;
use crate::model::rule::parse_weekday_token;
use crate::schedule::offset::EpochUnit;
use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::ops::Range;

const WEEKDAY: &str =
    r"(mon(?:day)?|tue(?:sday|s)?|wed(?:nesday)?|thu(?:rsday|rs|r)?|fri(?:day)?|sat(?:urday)?|sun(?:day)?)";

static EVERY_N_UNITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:every|each)\s+(\d+)\s+(day|week|month)s?\b")
        .expect("valid every-n-units regex")
});
static EVERY_NTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:every|each)\s+(\d{1,2})(?:st|nd|rd|th)\b(?:\s+(?:of\s+)?(?:the|every|each)\s+month)?",
    )
    .expect("valid every-nth regex")
});
static EVERY_N_WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:every|each)\s+(?:(\d+)\s+|(other)\s+)?{WEEKDAY}s?\b"
    ))
    .expect("valid every-weekday regex")
});
static EVERY_UNIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:(?:every|each)\s+(day|week|month)|(daily|weekly|monthly))\b")
        .expect("valid every-unit regex")
});
static IN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bin\s+(\d+|an?|one|two|three|four|five|six|seven|eight|nine|ten)\s+(day|week|month|year)s?\b",
    )
    .expect("valid relative offset regex")
});
static TOMORROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(today|tomorrow|tmrw)\b").expect("valid tomorrow regex"));
static ISO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").expect("valid iso date regex")
});
static MONTH_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(\d{1,2})(?:st|nd|rd|th)?\b(?:,?\s+(\d{4})\b)?",
    )
    .expect("valid month name regex")
});
static SLASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,2})/(\d{1,2})(?:/(\d{4}|\d{2}))?\b").expect("valid slash date regex")
});
static WEEKDAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:(on|next|this|by)\s+)?{WEEKDAY}\b"))
        .expect("valid weekday regex")
});
static LATER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:for\s+)?later\b").expect("valid later regex"));
static NOW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:right\s+)?now\b").expect("valid now regex"));

/// What a recognized phrase asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
    Every { unit: EpochUnit, n: u32 },
    EveryWeekday { weekday: Weekday, n: u32 },
    MonthDay(u32),
    On(NaiveDate),
    Later,
    Now,
}

/// A recognized phrase and the byte span it covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseMatch {
    pub when: When,
    pub span: Range<usize>,
}

type PhraseResult = Result<Option<PhraseMatch>, InterpretationFailure>;

/// Finds the highest-priority temporal phrase in `text`.
pub fn find_phrase(text: &str, today: NaiveDate) -> PhraseResult {
    let families: [&dyn Fn(&str, NaiveDate) -> PhraseResult; 5] = [
        &recurrence,
        &relative,
        &calendar_date,
        &weekday_reference,
        &keyword,
    ];
    for family in families {
        if let Some(found) = family(text, today)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

fn recurrence(text: &str, _today: NaiveDate) -> PhraseResult {
    if let Some(caps) = EVERY_N_UNITS_RE.captures(text) {
        let n = parse_count(&caps[1], &caps[0])?;
        let unit = unit_word(&caps[2]);
        return Ok(Some(matched(&caps, When::Every { unit, n })));
    }
    if let Some(caps) = EVERY_NTH_RE.captures(text) {
        let day = caps[1].parse::<u32>().unwrap_or(0);
        if !(1..=31).contains(&day) {
            return Err(InterpretationFailure::InvalidDate(caps[0].to_string()));
        }
        return Ok(Some(matched(&caps, When::MonthDay(day))));
    }
    if let Some(caps) = EVERY_N_WEEKDAY_RE.captures(text) {
        let n = match (caps.get(1), caps.get(2)) {
            (Some(count), _) => parse_count(count.as_str(), &caps[0])?,
            (None, Some(_)) => 2,
            (None, None) => 1,
        };
        let weekday = weekday_word(&caps[3])?;
        return Ok(Some(matched(&caps, When::EveryWeekday { weekday, n })));
    }
    if let Some(caps) = EVERY_UNIT_RE.captures(text) {
        let word = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map_or("day", |m| m.as_str());
        let unit = unit_word(word);
        return Ok(Some(matched(&caps, When::Every { unit, n: 1 })));
    }
    Ok(None)
}

fn relative(text: &str, today: NaiveDate) -> PhraseResult {
    if let Some(caps) = IN_RE.captures(text) {
        let n = number_word(&caps[1])
            .filter(|n| *n > 0)
            .ok_or_else(|| InterpretationFailure::InvalidDate(caps[0].to_string()))?;
        let unit = caps[2].to_ascii_lowercase();
        let date = match unit.as_str() {
            "day" => today.checked_add_signed(Duration::days(i64::from(n))),
            "week" => today.checked_add_signed(Duration::weeks(i64::from(n))),
            "month" => today.checked_add_months(Months::new(n)),
            _ => n
                .checked_mul(12)
                .and_then(|months| today.checked_add_months(Months::new(months))),
        }
        .ok_or_else(|| InterpretationFailure::InvalidDate(caps[0].to_string()))?;
        return Ok(Some(matched(&caps, When::On(date))));
    }
    if let Some(caps) = TOMORROW_RE.captures(text) {
        let date = if caps[1].eq_ignore_ascii_case("today") {
            today
        } else {
            today + Duration::days(1)
        };
        return Ok(Some(matched(&caps, When::On(date))));
    }
    Ok(None)
}

fn calendar_date(text: &str, today: NaiveDate) -> PhraseResult {
    if let Some(caps) = ISO_RE.captures(text) {
        let year = caps[1].parse::<i32>().unwrap_or(0);
        let date = resolve_date(&caps, today, Some(year), &caps[2], &caps[3])?;
        return Ok(Some(matched(&caps, When::On(date))));
    }
    if let Some(caps) = MONTH_NAME_RE.captures(text) {
        let month = month_number(&caps[1]);
        let year = caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok());
        let date = resolve_date(&caps, today, year, &month.to_string(), &caps[2])?;
        return Ok(Some(matched(&caps, When::On(date))));
    }
    if let Some(caps) = SLASH_RE.captures(text) {
        let year = caps.get(3).and_then(|m| {
            let raw = m.as_str();
            let year = raw.parse::<i32>().ok()?;
            Some(if raw.len() == 2 { 2000 + year } else { year })
        });
        let date = resolve_date(&caps, today, year, &caps[1], &caps[2])?;
        return Ok(Some(matched(&caps, When::On(date))));
    }
    Ok(None)
}

/// Bare abbreviations (`sat`, `sun`) are ordinary words; they only count
/// after `on`/`next`/`this`/`by`.
fn weekday_reference(text: &str, today: NaiveDate) -> PhraseResult {
    for caps in WEEKDAY_RE.captures_iter(text) {
        if caps.get(1).is_none() && caps[2].len() < 6 {
            continue;
        }
        let weekday = weekday_word(&caps[2])?;
        return Ok(Some(matched(&caps, When::On(next_weekday_after(today, weekday)))));
    }
    Ok(None)
}

fn keyword(text: &str, _today: NaiveDate) -> PhraseResult {
    if let Some(caps) = LATER_RE.captures(text) {
        return Ok(Some(matched(&caps, When::Later)));
    }
    if let Some(caps) = NOW_RE.captures(text) {
        return Ok(Some(matched(&caps, When::Now)));
    }
    Ok(None)
}

fn matched(caps: &Captures<'_>, when: When) -> PhraseMatch {
    let span = caps.get(0).map_or(0..0, |m| m.range());
    PhraseMatch { when, span }
}

/// Builds a date; a year-less date in the past rolls to next year, an
/// explicit one is rejected.
fn resolve_date(
    caps: &Captures<'_>,
    today: NaiveDate,
    year: Option<i32>,
    month: &str,
    day: &str,
) -> Result<NaiveDate, InterpretationFailure> {
    let invalid = || InterpretationFailure::InvalidDate(caps[0].to_string());
    let month = month.parse::<u32>().map_err(|_| invalid())?;
    let day = day.parse::<u32>().map_err(|_| invalid())?;

    match year {
        Some(year) => {
            let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
            if date < today {
                return Err(InterpretationFailure::PastDate(date));
            }
            Ok(date)
        }
        None => {
            // Feb 29 may only exist in a later year.
            (today.year()..=today.year() + 8)
                .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
                .find(|date| *date >= today)
                .ok_or_else(invalid)
        }
    }
}

/// First `weekday` strictly after `today`.
pub fn next_weekday_after(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + i64::from(weekday.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
        % 7;
    today + Duration::days(if ahead == 0 { 7 } else { ahead })
}

/// Counts that overflow are bad phrases; only an explicit 0 is a zero period.
fn parse_count(raw: &str, phrase: &str) -> Result<u32, InterpretationFailure> {
    match raw.parse::<u32>() {
        Ok(0) => Err(InterpretationFailure::ZeroPeriod),
        Ok(n) => Ok(n),
        Err(_) => Err(InterpretationFailure::InvalidDate(phrase.to_string())),
    }
}

fn unit_word(word: &str) -> EpochUnit {
    match word.to_ascii_lowercase().as_str() {
        "week" | "weekly" => EpochUnit::Week,
        "month" | "monthly" => EpochUnit::Month,
        _ => EpochUnit::Day,
    }
}

fn weekday_word(word: &str) -> Result<Weekday, InterpretationFailure> {
    let prefix: String = word.chars().take(3).collect();
    parse_weekday_token(&prefix)
        .ok_or_else(|| InterpretationFailure::InvalidDate(word.to_string()))
}

fn number_word(word: &str) -> Option<u32> {
    let n = match word.to_ascii_lowercase().as_str() {
        "a" | "an" | "one" => 1,
        "two" => 2,
        "three" => 3,
        "four" => 4,
        "five" => 5,
        "six" => 6,
        "seven" => 7,
        "eight" => 8,
        "nine" => 9,
        "ten" => 10,
        digits => return digits.parse().ok(),
    };
    Some(n)
}

fn month_number(word: &str) -> u32 {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    let word: String = word.to_ascii_lowercase().chars().take(3).collect();
    MONTHS
        .iter()
        .position(|month| *month == word)
        .map_or(0, |index| index as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::{find_phrase, next_weekday_after, When};
    use crate::interpret::InterpretationFailure;
    use crate::schedule::offset::EpochUnit;
    use chrono::{NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn when(text: &str) -> Option<When> {
        find_phrase(text, date(2026, 10, 19))
            .unwrap()
            .map(|found| found.when)
    }

    #[test]
    fn recurrence_beats_everything_else() {
        assert_eq!(
            when("every 3 days stretch tomorrow"),
            Some(When::Every {
                unit: EpochUnit::Day,
                n: 3
            })
        );
        assert_eq!(
            when("every other Tuesday standup"),
            Some(When::EveryWeekday {
                weekday: Weekday::Tue,
                n: 2
            })
        );
        assert_eq!(when("pay rent every 1st"), Some(When::MonthDay(1)));
        assert_eq!(
            when("water plants weekly"),
            Some(When::Every {
                unit: EpochUnit::Week,
                n: 1
            })
        );
    }

    #[test]
    fn relative_and_calendar_dates() {
        assert_eq!(when("in 2 weeks renew"), Some(When::On(date(2026, 11, 2))));
        assert_eq!(when("in a month call"), Some(When::On(date(2026, 11, 19))));
        assert_eq!(when("tomorrow call"), Some(When::On(date(2026, 10, 20))));
        assert_eq!(when("party Dec 24"), Some(When::On(date(2026, 12, 24))));
        assert_eq!(when("taxes on 4/15"), Some(When::On(date(2027, 4, 15))));
        assert_eq!(
            when("flight 2027-01-02"),
            Some(When::On(date(2027, 1, 2)))
        );
    }

    #[test]
    fn weekday_references_are_strictly_after_today() {
        assert_eq!(when("call mom on monday"), Some(When::On(date(2026, 10, 26))));
        assert_eq!(when("next fri demo"), Some(When::On(date(2026, 10, 23))));
        assert_eq!(next_weekday_after(date(2026, 10, 19), Weekday::Tue), date(2026, 10, 20));
    }

    #[test]
    fn keywords_and_misses() {
        assert_eq!(when("learn banjo later"), Some(When::Later));
        assert_eq!(when("ping bob now"), Some(When::Now));
        assert_eq!(when("buy milk"), None);
        assert_eq!(when("sat down with the sun cream"), None);
        assert_eq!(when("go to market 5 times"), None);
    }

    #[test]
    fn bad_phrases_are_failures() {
        let today = date(2026, 10, 19);
        assert_eq!(
            find_phrase("every 0 days", today),
            Err(InterpretationFailure::ZeroPeriod)
        );
        assert_eq!(
            find_phrase("on 2020-01-01", today),
            Err(InterpretationFailure::PastDate(date(2020, 1, 1)))
        );
        assert!(matches!(
            find_phrase("feb 30", today),
            Err(InterpretationFailure::InvalidDate(_))
        ));
    }

    #[test]
    fn out_of_range_counts_are_invalid_dates() {
        let today = date(2026, 10, 19);
        for phrase in [
            "in 9999999999 days",
            "in 0 days",
            "every 9999999999 days",
            "every 9999999999 mondays",
        ] {
            assert!(
                matches!(
                    find_phrase(phrase, today),
                    Err(InterpretationFailure::InvalidDate(_))
                ),
                "{phrase}"
            );
        }
        assert_eq!(when("in 3 days"), Some(When::On(date(2026, 10, 22))));
    }
}
