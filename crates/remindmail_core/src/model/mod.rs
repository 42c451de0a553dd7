//! Reminder domain model.
//!
//! # Responsibility
//! - Define the canonical rule record shared by codecs, evaluator and interpreter.
//! - Keep one rule shape regardless of which text encoding persisted it.
//!
//! # Invariants
//! - Scheduling fields are only interpreted through `Rule::schedule()`.
//! - Source position is codec bookkeeping and never affects evaluation.

pub mod rule;
