//! Recurrence math and rule evaluation.
//!
//! # Responsibility
//! - Provide epoch ordinals (day/week/month) and offset alignment helpers.
//! - Decide whether a rule fires on a given calendar date.
//!
//! # Invariants
//! - Everything here is pure: no I/O, no clock reads.
//! - Evaluation's modulo test is `offset::offset_for`, so a rule created with
//!   `offset_for(unit, d, n)` always fires on `d`.

pub mod evaluate;
pub mod offset;
