//! Terminal confirmation before a reminder is saved.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use remindmail_core::model::rule::notes_separator;
use remindmail_core::{InterpretationError, InterpretationFailure, Interpreter, Rule, RuleKey};
use std::io::{BufRead, Write};

/// What the user decided about a proposed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Save(Rule),
    Cancel,
}

/// Shows `rule` and loops until the user saves or cancels it.
///
/// The user may retitle it, give a new time phrase, or drop the time and
/// send `original` right away. End of input cancels.
pub fn confirm(
    input: &mut impl BufRead,
    output: &mut impl Write,
    mut rule: Rule,
    original: &str,
    interpreter: &Interpreter,
    now: NaiveDateTime,
) -> Result<Decision> {
    loop {
        write_summary(output, &rule)?;
        write!(
            output,
            "OK? (y)es, (n)o, (t)itle, (w)hen, (p)arse without time: "
        )?;
        output.flush()?;

        let Some(answer) = read_answer(input)? else {
            return Ok(Decision::Cancel);
        };
        match answer.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(Decision::Save(rule)),
            "n" | "no" => return Ok(Decision::Cancel),
            "t" | "title" => {
                write!(output, "Title: ")?;
                output.flush()?;
                match read_answer(input)? {
                    Some(title) if !title.is_empty() => rule.title = title,
                    Some(_) => {}
                    None => return Ok(Decision::Cancel),
                }
            }
            "w" | "when" => {
                write!(output, "When: ")?;
                output.flush()?;
                let Some(when) = read_answer(input)? else {
                    return Ok(Decision::Cancel);
                };
                match interpreter.interpret_when(&rule.title, &when, now) {
                    Ok(mut proposed) => {
                        proposed.notes = rule.notes;
                        proposed.tags = rule.tags;
                        proposed.command = rule.command;
                        rule = proposed;
                    }
                    Err(err) => writeln!(output, "{err}")?,
                }
            }
            "p" | "parse" => {
                let title = notes_separator(original)
                    .map_or(original, |index| &original[..index])
                    .trim();
                if !title.is_empty() {
                    let mut immediate = Rule::new(RuleKey::Now, title);
                    immediate.notes = rule.notes;
                    immediate.tags = rule.tags;
                    rule = immediate;
                }
            }
            _ => {}
        }
        writeln!(output)?;
    }
}

/// Reports `error` and asks for a new time phrase until one interprets.
///
/// A known `title` is kept; otherwise the user is asked for one, with
/// `original` as the default. End of input gives `None`.
pub fn recover(
    input: &mut impl BufRead,
    output: &mut impl Write,
    error: &InterpretationError,
    title: Option<&str>,
    original: &str,
    interpreter: &Interpreter,
    now: NaiveDateTime,
) -> Result<Option<Rule>> {
    writeln!(output, "{error}")?;
    let mut title = title
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string);
    loop {
        let current = match title.take() {
            Some(current) => current,
            None => match ask_title(input, output, original.trim())? {
                Some(current) => current,
                None => return Ok(None),
            },
        };
        write!(output, "When do you want to be reminded? ")?;
        output.flush()?;
        let Some(when) = read_answer(input)? else {
            return Ok(None);
        };
        match interpreter.interpret_when(&current, &when, now) {
            Ok(rule) => return Ok(Some(rule)),
            Err(err) => {
                writeln!(output, "{err}")?;
                if err.failure != InterpretationFailure::MissingTitle {
                    title = Some(current);
                }
            }
        }
    }
}

fn ask_title(
    input: &mut impl BufRead,
    output: &mut impl Write,
    default: &str,
) -> Result<Option<String>> {
    loop {
        if default.is_empty() {
            write!(output, "Title: ")?;
        } else {
            write!(output, "Title [{default}]: ")?;
        }
        output.flush()?;
        let Some(answer) = read_answer(input)? else {
            return Ok(None);
        };
        let title = if answer.is_empty() { default } else { answer.as_str() };
        if !title.is_empty() {
            return Ok(Some(title.to_string()));
        }
    }
}

/// One-line schedule description plus flags, e.g. `every 2 weeks (once) #home`.
pub fn describe_schedule(rule: &Rule) -> String {
    let mut text = match rule.schedule() {
        Ok(schedule) => schedule.to_string(),
        Err(err) => format!("invalid: {err}"),
    };
    if rule.delete_after_send && rule.key != RuleKey::Date {
        text.push_str(" (once)");
    }
    if rule.command.is_some() {
        text.push_str(" (command)");
    }
    for tag in &rule.tags {
        text.push_str(" #");
        text.push_str(tag);
    }
    text
}

fn write_summary(output: &mut impl Write, rule: &Rule) -> Result<()> {
    writeln!(output, "Your reminder for {}:", describe_schedule(rule))?;
    writeln!(output, "{}", rule.title)?;
    if !rule.notes.trim().is_empty() {
        writeln!(output, "Notes: {}", rule.notes.trim())?;
    }
    Ok(())
}

fn read_answer(input: &mut impl BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .context("failed to read answer")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::{confirm, describe_schedule, recover, Decision};
    use chrono::NaiveDate;
    use remindmail_core::{Interpreter, Rule, RuleKey};
    use std::io::Cursor;

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 19)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn run(answers: &str, rule: Rule, original: &str) -> (Decision, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let decision = confirm(
            &mut input,
            &mut output,
            rule,
            original,
            &Interpreter::default(),
            now(),
        )
        .unwrap();
        (decision, String::from_utf8(output).unwrap())
    }

    #[test]
    fn yes_saves_the_proposal() {
        let rule = Rule::on_date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), "call mom");
        let (decision, output) = run("y\n", rule.clone(), "call mom tomorrow");
        assert_eq!(decision, Decision::Save(rule));
        assert!(output.contains("Your reminder for Tuesday, October 20, 2026:\ncall mom"));
    }

    #[test]
    fn end_of_input_cancels() {
        let rule = Rule::new(RuleKey::Later, "learn banjo");
        assert_eq!(run("", rule.clone(), "learn banjo later").0, Decision::Cancel);
        assert_eq!(run("maybe\nn\n", rule, "learn banjo later").0, Decision::Cancel);
    }

    #[test]
    fn title_and_when_can_be_corrected() {
        let rule = Rule::new(RuleKey::Later, "water plant").with_notes("the fern");
        let (decision, output) = run(
            "t\nwater plants\nw\nevery fortnight-ish\nw\nevery 2 weeks\ny\n",
            rule,
            "water plant later",
        );
        assert!(output.contains("no date or recurrence recognized"));
        match decision {
            Decision::Save(saved) => {
                assert_eq!(saved.title, "water plants");
                assert_eq!(saved.key, RuleKey::Week);
                assert_eq!(saved.frequency, Some(2));
                assert_eq!(saved.notes, "the fern");
            }
            Decision::Cancel => panic!("expected the rule to be saved"),
        }
    }

    #[test]
    fn parse_without_time_sends_the_whole_text_now() {
        let rule = Rule::on_date(NaiveDate::from_ymd_opt(2026, 10, 23).unwrap(), "meet at");
        let (decision, _) = run("p\ny\n", rule, "meet at friday's: bring cake");
        match decision {
            Decision::Save(saved) => {
                assert_eq!(saved.key, RuleKey::Now);
                assert_eq!(saved.title, "meet at friday's");
            }
            Decision::Cancel => panic!("expected the rule to be saved"),
        }
    }

    fn rerun(answers: &str, title: Option<&str>, original: &str) -> (Option<Rule>, String) {
        let interpreter = Interpreter::default();
        let err = interpreter.interpret(original, now()).unwrap_err();
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let rule = recover(
            &mut input,
            &mut output,
            &err,
            title,
            original,
            &interpreter,
            now(),
        )
        .unwrap();
        (rule, String::from_utf8(output).unwrap())
    }

    #[test]
    fn bad_time_phrase_asks_again() {
        let (rule, output) = rerun(
            "renew passport\nwhenever\nin 2 weeks\n",
            None,
            "renew passport in 0 days: old one expires",
        );
        let rule = rule.expect("a rule after the second phrase");
        assert_eq!(rule.title, "renew passport");
        assert_eq!(rule.key, RuleKey::Date);
        assert_eq!(rule.value.as_deref(), Some("2026-11-02"));
        assert!(output.contains("Title [renew passport in 0 days: old one expires]: "));
        assert!(output.contains("no date or recurrence recognized"));
        assert_eq!(output.matches("When do you want to be reminded? ").count(), 2);
    }

    #[test]
    fn known_title_is_kept_and_blank_title_uses_the_text() {
        let (rule, output) = rerun("every 2 weeks\n", Some("water plants"), "every 0 days");
        assert!(!output.contains("Title"));
        let rule = rule.unwrap();
        assert_eq!(rule.title, "water plants");
        assert_eq!(rule.frequency, Some(2));

        let (rule, _) = rerun("\ntomorrow\n", None, "call mom in 0 days: about sunday");
        let rule = rule.unwrap();
        assert_eq!(rule.title, "call mom in 0 days");
        assert_eq!(rule.notes, "about sunday");
    }

    #[test]
    fn end_of_input_while_asking_again_cancels() {
        assert_eq!(rerun("", None, "renew passport in 0 days").0, None);
        assert_eq!(rerun("renew passport\nwhenever\n", None, "renew passport in 0 days").0, None);
    }

    #[test]
    fn schedule_description_lists_flags() {
        let mut rule = Rule::periodic(RuleKey::Week, 2, 0, "backup").with_tags(["home"]);
        rule.delete_after_send = true;
        assert_eq!(describe_schedule(&rule), "every 2 weeks on Sunday (once) #home");
    }
}
