//! Core domain logic for remindmail.
//! Rule model, recurrence evaluation, store codecs, phrase interpretation
//! and the generate pass live here; front-ends only wire collaborators.

pub mod interpret;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod service;
pub mod store;

pub use interpret::{
    interpret, InterpretationError, InterpretationFailure, Interpreter,
    DEFAULT_DAY_STARTS_AT_HOUR,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::rule::{Rule, RuleKey, RuleValidationError, Schedule, SourcePosition};
pub use schedule::evaluate::{evaluate, evaluate_and_annotate, evaluate_match, EvaluationError, Match};
pub use schedule::offset::{offset_for, EpochUnit};
pub use service::{
    AddOutcome, Agenda, AgendaDay, CommandDelivery, CommandError, CommandRunner, Deliver,
    DeliveryError, GenerateOptions, GenerateReport, ReminderService, SendError, SendFailure,
    ServiceError, ServiceResult, ShellCommandRunner,
};
pub use store::{
    FileRuleStore, ParsedStore, RuleStore, StoreError, StoreFormat, StoreResult, StoreSnapshot,
    StoreWarning,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
