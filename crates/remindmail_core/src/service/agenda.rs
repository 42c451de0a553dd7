//! Read-only agenda queries and the later-bucket digest.

use crate::model::rule::{parse_weekday_token, weekday_name, Rule, RuleKey};
use crate::schedule::evaluate::{evaluate_match, Match};
use crate::service::delivery::{CommandRunner, Deliver};
use crate::service::{report_skipped, ReminderService, SendError, ServiceError, ServiceResult};
use crate::store::{ParsedStore, RuleStore};
use chrono::{Datelike, Duration, NaiveDate};
use log::info;

/// Rules firing on one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub rules: Vec<Rule>,
}

/// Rules firing over a window of days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Agenda {
    pub days: Vec<AgendaDay>,
    /// One diagnostic line per skipped store entry or invalid rule.
    pub skipped: Vec<String>,
}

impl<S: RuleStore, D: Deliver, C: CommandRunner> ReminderService<S, D, C> {
    /// All valid rules and per-entry warnings, in store order.
    pub fn list(&self) -> ServiceResult<ParsedStore> {
        Ok(self.store.load()?.parsed)
    }

    /// What fires on each of `days` days starting at `from`.
    ///
    /// Late catch-ups are listed on the first day only, since that is the
    /// next time a generate pass would send them.
    pub fn upcoming(&self, from: NaiveDate, days: u32, tags: &[String]) -> ServiceResult<Agenda> {
        let parsed = self.list()?;
        let mut agenda = Agenda {
            skipped: parsed.warnings.iter().map(ToString::to_string).collect(),
            ..Agenda::default()
        };
        let rules: Vec<&Rule> = parsed
            .rules
            .iter()
            .filter(|rule| tags.is_empty() || rule.has_tag_in(tags))
            .collect();

        for step in 0..days {
            let date = from + Duration::days(i64::from(step));
            let mut firing = Vec::new();
            for rule in &rules {
                match evaluate_match(rule, date) {
                    Ok(Match::OnTime) => firing.push((*rule).clone()),
                    Ok(Match::Late { .. }) if step == 0 => firing.push((*rule).clone()),
                    Ok(_) => {}
                    Err(err) if step == 0 => agenda
                        .skipped
                        .push(report_skipped("rule_skipped", err.to_string())),
                    Err(_) => {}
                }
            }
            agenda.days.push(AgendaDay {
                date,
                rules: firing,
            });
        }
        Ok(agenda)
    }

    /// The later bucket.
    pub fn later(&self) -> ServiceResult<Vec<Rule>> {
        Ok(self
            .list()?
            .rules
            .into_iter()
            .filter(|rule| rule.key == RuleKey::Later)
            .collect())
    }

    /// Delivers one digest of every later rule; returns how many it listed.
    ///
    /// Nothing is sent when the bucket is empty.
    pub fn send_later(&self, today: NaiveDate) -> ServiceResult<usize> {
        let rules = self.later()?;
        if rules.is_empty() {
            info!("event=send_later module=service status=skipped reason=empty");
            return Ok(0);
        }

        let title = format!("Reminders for later, {}", today.format("%Y-%m-%d"));
        self.delivery
            .deliver(&title, &later_digest(&rules))
            .map_err(|err| ServiceError::Send(SendError::Delivery(err)))?;
        info!(
            "event=send_later module=service status=ok count={}",
            rules.len()
        );
        Ok(rules.len())
    }

    /// Rules whose title, value or weekday contains `text`, plus rules
    /// firing on `text` when it reads as a date.
    pub fn find(&self, text: &str, today: NaiveDate) -> ServiceResult<Vec<Rule>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let target = parse_search_date(&needle, today);

        Ok(self
            .list()?
            .rules
            .into_iter()
            .filter(|rule| {
                rule.title.to_lowercase().contains(&needle)
                    || rule
                        .value
                        .as_deref()
                        .is_some_and(|value| value.to_lowercase().contains(&needle))
                    || rule
                        .value
                        .as_deref()
                        .and_then(parse_weekday_token)
                        .filter(|_| rule.key == RuleKey::DayOfWeek)
                        .is_some_and(|weekday| {
                            weekday_name(weekday).to_lowercase().contains(&needle)
                        })
                    || target.is_some_and(|date| {
                        matches!(evaluate_match(rule, date), Ok(Match::OnTime))
                    })
            })
            .collect())
    }
}

fn later_digest(rules: &[Rule]) -> String {
    let mut body = String::from("Here are your reminders for later:\n");
    for rule in rules {
        body.push_str(&format!("\u{2022} {}\n", rule.title));
        for note in rule.notes.lines().filter(|line| !line.trim().is_empty()) {
            body.push_str(&format!("  - {}\n", note.trim()));
        }
    }
    body
}

/// `YYYY-MM-DD`, `MM/DD/YYYY`, or year-less `MM-DD` / `MM/DD` (this year).
fn parse_search_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%m/%d/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-{text}", today.year()), "%Y-%m-%d"))
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}/{text}", today.year()), "%Y/%m/%d"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::{later_digest, parse_search_date};
    use crate::model::rule::{Rule, RuleKey};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn search_dates_accept_four_shapes() {
        let today = date(2026, 10, 19);
        assert_eq!(parse_search_date("2026-12-01", today), Some(date(2026, 12, 1)));
        assert_eq!(parse_search_date("12/01/2027", today), Some(date(2027, 12, 1)));
        assert_eq!(parse_search_date("12-01", today), Some(date(2026, 12, 1)));
        assert_eq!(parse_search_date("12/01", today), Some(date(2026, 12, 1)));
        assert_eq!(parse_search_date("dentist", today), None);
    }

    #[test]
    fn digest_lists_titles_and_notes() {
        let rules = vec![
            Rule::new(RuleKey::Later, "learn banjo").with_notes("start with chords"),
            Rule::new(RuleKey::Later, "read dune"),
        ];
        assert_eq!(
            later_digest(&rules),
            "Here are your reminders for later:\n\u{2022} learn banjo\n  - start with chords\n\u{2022} read dune\n"
        );
    }
}
