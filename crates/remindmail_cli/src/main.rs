//! `remind` command-line entry point.
//!
//! # Responsibility
//! - Resolve configuration, start logging and wire the core service.
//! - Own every terminal interaction: prompts, listings, diagnostics.
//!
//! # Invariants
//! - Batch commands print one diagnostic line per skipped store entry and
//!   keep going; only store-level failures abort.

mod cli;
mod config;
mod delivery;
mod prompt;

use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate};
use clap::Parser;
use remindmail_core::model::rule::normalize_tags;
use remindmail_core::{
    init_logging, offset_for, AddOutcome, FileRuleStore, GenerateOptions, Interpreter,
    ReminderService, Rule, RuleKey, RuleStore, ShellCommandRunner,
};
use std::io::IsTerminal;
use std::process::ExitCode;

use crate::cli::{CliArgs, Command};
use crate::config::{RemindConfig, Settings};
use crate::delivery::Delivery;
use crate::prompt::{confirm, describe_schedule, recover, Decision};

type Service = ReminderService<FileRuleStore, Delivery, ShellCommandRunner>;

fn main() -> Result<ExitCode> {
    let args = CliArgs::parse();
    let config = RemindConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let settings = config.resolve(args.store.clone())?;

    if let Err(err) = init_logging(&settings.log_level, &settings.log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let service = ReminderService::new(
        FileRuleStore::new(&settings.store_path, settings.store_format),
        Delivery::from_command(settings.delivery_command.as_deref()),
        ShellCommandRunner,
    );
    let interpreter = Interpreter::new(settings.day_starts_at_hour);
    let now = Local::now().naive_local();
    let today = now.date();

    match args.command {
        Command::Generate {
            dry_run,
            date,
            tags,
        } => {
            return generate(&service, date.unwrap_or(today), GenerateOptions { dry_run, tags });
        }
        Command::Add {
            text,
            title,
            when,
            notes,
            tags,
            yes,
        } => {
            let original = text.join(" ");
            let interactive = !yes && std::io::stdin().is_terminal();
            let interpreted = match (title.as_deref(), when.as_deref()) {
                (Some(title), Some(when)) => interpreter.interpret_when(title, when, now),
                (Some(title), None) => Ok(Rule::new(RuleKey::Now, title.trim())),
                (None, _) => interpreter.interpret(&original, now),
            };
            let mut rule = match interpreted {
                Ok(rule) => rule,
                Err(err) if interactive => {
                    let recovered = recover(
                        &mut std::io::stdin().lock(),
                        &mut std::io::stdout(),
                        &err,
                        title.as_deref(),
                        &original,
                        &interpreter,
                        now,
                    )?;
                    match recovered {
                        Some(rule) => rule,
                        None => {
                            println!("Cancelled.");
                            return Ok(ExitCode::SUCCESS);
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            };
            if let Some(notes) = notes {
                rule.push_note(notes.trim());
            }
            rule.tags.extend(normalize_tags(tags));

            if interactive {
                let decision = confirm(
                    &mut std::io::stdin().lock(),
                    &mut std::io::stdout(),
                    rule,
                    &original,
                    &interpreter,
                    now,
                )?;
                match decision {
                    Decision::Save(confirmed) => rule = confirmed,
                    Decision::Cancel => {
                        println!("Cancelled.");
                        return Ok(ExitCode::SUCCESS);
                    }
                }
            }
            match service.add(&rule)? {
                AddOutcome::Saved => println!(
                    "Saved to {}: {} ({})",
                    settings.store_path.display(),
                    rule.title,
                    describe_schedule(&rule)
                ),
                AddOutcome::Sent => println!("Sent: {}", rule.title),
            }
        }
        Command::Week { days, tags } => agenda(&service, today, days.max(1), &tags)?,
        Command::Tomorrow => agenda(&service, today + Duration::days(1), 1, &[])?,
        Command::Later => {
            let rules = service.later()?;
            if rules.is_empty() {
                println!("Nothing saved for later.");
            }
            for rule in rules {
                println!("- {}", rule.title);
            }
        }
        Command::SendLater => match service.send_later(today)? {
            0 => println!("Nothing saved for later; nothing sent."),
            count => println!("Sent a digest of {count} reminder(s) for later."),
        },
        Command::List => {
            let parsed = service.list()?;
            for warning in &parsed.warnings {
                eprintln!("skipped {warning}");
            }
            for rule in &parsed.rules {
                println!("{} | {}", rule.title, describe_schedule(rule));
            }
        }
        Command::Find { text } => {
            let rules = service.find(&text.join(" "), today)?;
            if rules.is_empty() {
                println!("No matching reminders.");
            }
            for rule in &rules {
                println!("{} | {}", rule.title, describe_schedule(rule));
            }
        }
        Command::Offset { unit, args } => {
            let (date, n) = parse_offset_args(&args, today)?;
            println!("{}", offset_for(unit, date, n));
            if n == 1 {
                println!("Note: every single {unit} always fires; no offset is needed.");
            }
        }
        Command::Edit => edit(&settings)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn generate(service: &Service, today: NaiveDate, options: GenerateOptions) -> Result<ExitCode> {
    let report = service.generate(today, &options)?;
    for skipped in &report.skipped {
        eprintln!("skipped {skipped}");
    }
    if report.dry_run {
        for rule in &report.matched {
            println!("would send: {}", rule.title);
        }
        return Ok(ExitCode::SUCCESS);
    }
    for failure in &report.failed {
        eprintln!("not sent: {}: {}", failure.title, failure.error);
    }
    println!(
        "{today}: sent {}, failed {}, removed {}",
        report.delivered.len(),
        report.failed.len(),
        report.removed
    );
    Ok(if report.failed.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn agenda(service: &Service, from: NaiveDate, days: u32, tags: &[String]) -> Result<()> {
    let agenda = service.upcoming(from, days, tags)?;
    for skipped in &agenda.skipped {
        eprintln!("skipped {skipped}");
    }
    for day in &agenda.days {
        println!("{}", day.date.format("%A, %B %d"));
        if day.rules.is_empty() {
            println!("  (nothing)");
        }
        for rule in &day.rules {
            println!("  - {}", rule.title);
        }
    }
    Ok(())
}

/// `[date] <n>` with the date defaulting to `today`.
fn parse_offset_args(args: &[String], today: NaiveDate) -> Result<(NaiveDate, u32)> {
    let (date, n) = match args {
        [n] => (today, n),
        [date, n] => (
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("date must be YYYY-MM-DD, got `{date}`"))?,
            n,
        ),
        _ => bail!("usage: remind offset <day|week|month> [YYYY-MM-DD] <n>"),
    };
    let n: u32 = n
        .parse()
        .with_context(|| format!("<n> must be a whole number, got `{n}`"))?;
    if n == 0 {
        bail!("<n> must be at least 1");
    }
    Ok((date, n))
}

fn edit(settings: &Settings) -> Result<()> {
    let editor = std::env::var("VISUAL")
        .or_else(|_| std::env::var("EDITOR"))
        .ok()
        .filter(|editor| !editor.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string());
    if let Some(parent) = settings.store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let status = std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("{editor} \"$1\""))
        .arg("sh")
        .arg(&settings.store_path)
        .status()
        .with_context(|| format!("failed to start editor `{editor}`"))?;
    if !status.success() {
        bail!("editor `{editor}` exited with {status}");
    }

    // Surface entries that no longer parse right after the edit.
    let store = FileRuleStore::new(&settings.store_path, settings.store_format);
    if settings.store_path.exists() {
        let snapshot = store.load()?;
        for warning in &snapshot.parsed.warnings {
            eprintln!("skipped {warning}");
        }
        println!("{} reminder(s) in {}", snapshot.parsed.rules.len(), settings.store_path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_offset_args;
    use chrono::NaiveDate;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn offset_args_default_to_today() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(parse_offset_args(&args(&["3"]), today).unwrap(), (today, 3));
        assert_eq!(
            parse_offset_args(&args(&["2026-12-31", "12"]), today).unwrap(),
            (NaiveDate::from_ymd_opt(2026, 12, 31).unwrap(), 12)
        );
    }

    #[test]
    fn offset_args_reject_bad_input() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert!(parse_offset_args(&args(&["0"]), today).is_err());
        assert!(parse_offset_args(&args(&["x"]), today).is_err());
        assert!(parse_offset_args(&args(&["12/31/2026", "3"]), today).is_err());
    }
}
