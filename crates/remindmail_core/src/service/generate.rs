//! Daily generate pass.

use crate::logging::{sanitize_message, MAX_LOGGED_TEXT_CHARS};
use crate::model::rule::Rule;
use crate::schedule::evaluate::evaluate_and_annotate;
use crate::service::delivery::{CommandRunner, Deliver};
use crate::service::{report_skipped, ReminderService, SendError, ServiceResult};
use crate::store::RuleStore;
use chrono::NaiveDate;
use log::{info, warn};
use std::time::Instant;

/// Knobs for one generate pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Evaluate and report only: no delivery, no store write.
    pub dry_run: bool,
    /// Only rules carrying at least one of these tags; empty means all.
    pub tags: Vec<String>,
}

/// A matched rule that was not sent.
#[derive(Debug)]
pub struct SendFailure {
    pub title: String,
    pub error: SendError,
}

/// Outcome of one generate pass.
#[derive(Debug, Default)]
pub struct GenerateReport {
    pub date: Option<NaiveDate>,
    pub dry_run: bool,
    /// Rules that fired, with late notes applied.
    pub matched: Vec<Rule>,
    /// Titles delivered successfully.
    pub delivered: Vec<String>,
    pub failed: Vec<SendFailure>,
    /// Rules removed from the store.
    pub removed: usize,
    /// One diagnostic line per skipped store entry or invalid rule.
    pub skipped: Vec<String>,
}

impl<S: RuleStore, D: Deliver, C: CommandRunner> ReminderService<S, D, C> {
    /// Evaluates every rule against `today`, delivers matches and removes
    /// delivered one-shot rules in one store write.
    ///
    /// # Errors
    /// Only store failures (unreadable store, write conflict) are errors;
    /// per-rule problems are collected in the report.
    pub fn generate(&self, today: NaiveDate, options: &GenerateOptions) -> ServiceResult<GenerateReport> {
        let started_at = Instant::now();
        let snapshot = self.store.load()?;
        let mut report = GenerateReport {
            date: Some(today),
            dry_run: options.dry_run,
            ..GenerateReport::default()
        };

        for warning in &snapshot.parsed.warnings {
            report
                .skipped
                .push(report_skipped("store_entry_skipped", warning.to_string()));
        }

        let mut to_remove = Vec::new();
        for stored in &snapshot.parsed.rules {
            if !options.tags.is_empty() && !stored.has_tag_in(&options.tags) {
                continue;
            }

            let mut rule = stored.clone();
            let outcome = match evaluate_and_annotate(&mut rule, today) {
                Ok(outcome) => outcome,
                Err(err) => {
                    report
                        .skipped
                        .push(report_skipped("rule_skipped", err.to_string()));
                    continue;
                }
            };
            if !outcome.fires() {
                continue;
            }
            report.matched.push(rule.clone());
            if options.dry_run {
                continue;
            }

            match self.send(&rule) {
                Ok(()) => {
                    info!(
                        "event=reminder_send module=service status=ok title={}",
                        sanitize_message(&rule.title, MAX_LOGGED_TEXT_CHARS)
                    );
                    report.delivered.push(rule.title.clone());
                    if rule.delete_after_send {
                        to_remove.push(rule);
                    }
                }
                Err(error) => {
                    warn!(
                        "event=reminder_send module=service status=error title={} error={}",
                        sanitize_message(&rule.title, MAX_LOGGED_TEXT_CHARS),
                        sanitize_message(&error.to_string(), MAX_LOGGED_TEXT_CHARS)
                    );
                    report.failed.push(SendFailure {
                        title: rule.title.clone(),
                        error,
                    });
                }
            }
        }

        report.removed = self.store.remove(&snapshot, &to_remove)?;
        info!(
            "event=generate module=service status=ok date={} dry_run={} matched={} delivered={} failed={} removed={} skipped={} duration_ms={}",
            today,
            options.dry_run,
            report.matched.len(),
            report.delivered.len(),
            report.failed.len(),
            report.removed,
            report.skipped.len(),
            started_at.elapsed().as_millis()
        );
        Ok(report)
    }
}
