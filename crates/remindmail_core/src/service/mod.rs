//! Reminder use-case services.
//!
//! # Responsibility
//! - Orchestrate store, evaluator, delivery and command runner into the
//!   generate pass, agenda queries and rule creation.
//! - Keep every external collaborator behind an explicitly passed seam.
//!
//! # Invariants
//! - A one-shot rule is removed only after its delivery succeeded.
//! - All removals of one pass are applied in a single store write.
//! - A skipped or failing rule never aborts the rest of a pass.

use crate::model::rule::{Rule, RuleKey};
use crate::store::{RuleStore, StoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod agenda;
pub mod delivery;
pub mod generate;

pub use agenda::{Agenda, AgendaDay};
pub use delivery::{
    CommandDelivery, CommandError, CommandRunner, Deliver, DeliveryError, ShellCommandRunner,
};
pub use generate::{GenerateOptions, GenerateReport, SendFailure};

use crate::logging::{sanitize_message, MAX_LOGGED_TEXT_CHARS};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level failure.
#[derive(Debug)]
pub enum ServiceError {
    /// The store could not be read or written.
    Store(StoreError),
    /// An immediate (`Now`) reminder could not be sent.
    Send(SendError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Send(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Send(err) => Some(err),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Why one reminder was not sent.
#[derive(Debug)]
pub enum SendError {
    Command(CommandError),
    Delivery(DeliveryError),
}

impl Display for SendError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Command(err) => write!(f, "command failed: {err}"),
            Self::Delivery(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SendError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Command(err) => Some(err),
            Self::Delivery(err) => Some(err),
        }
    }
}

/// What `ReminderService::add` did with a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended to the store.
    Saved,
    /// A `Now` rule: delivered immediately, not stored.
    Sent,
}

/// Reminder use-case service over explicit collaborators.
pub struct ReminderService<S, D, C> {
    store: S,
    delivery: D,
    commands: C,
}

impl<S: RuleStore, D: Deliver, C: CommandRunner> ReminderService<S, D, C> {
    pub fn new(store: S, delivery: D, commands: C) -> Self {
        Self {
            store,
            delivery,
            commands,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists `rule`, or sends it right away when it is a `Now` rule.
    pub fn add(&self, rule: &Rule) -> ServiceResult<AddOutcome> {
        if rule.key == RuleKey::Now {
            self.send(rule).map_err(ServiceError::Send)?;
            return Ok(AddOutcome::Sent);
        }

        self.store.append(rule)?;
        info!(
            "event=rule_add module=service status=ok key={} title={}",
            rule.key.label(),
            sanitize_message(&rule.title, MAX_LOGGED_TEXT_CHARS)
        );
        Ok(AddOutcome::Saved)
    }

    /// Builds the body (running the command if there is one) and delivers.
    pub(crate) fn send(&self, rule: &Rule) -> Result<(), SendError> {
        let body = match rule.command.as_deref() {
            Some(command) => self.commands.run(command).map_err(SendError::Command)?,
            None => rule.notes.clone(),
        };
        self.delivery
            .deliver(&rule.title, &body)
            .map_err(SendError::Delivery)
    }
}

/// Logs one skipped store entry or rule and returns its diagnostic line.
pub(crate) fn report_skipped(event: &str, diagnostic: String) -> String {
    warn!(
        "event={event} module=service status=skipped detail={}",
        sanitize_message(&diagnostic, MAX_LOGGED_TEXT_CHARS)
    );
    diagnostic
}
