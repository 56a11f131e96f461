//! Core data model for kiln.
//!
//! Build actions and the memo records that remember them,
//! test cases parsed from fixtures and the results of running them.

mod action;
mod record;

pub use action::{BuildAction, Color};
pub use record::MemoRecord;
pub use test::{DiffLine, DiffTag, Outcome, TestCase, TestResult};
