//! # estimo-engine
//!
//! Aggregation and completion of epic and risk scoring.
//!
//! [`ScoringEngine`] validates submissions, checks quorum after every one,
//! and commits the computed result exactly once per target. The arithmetic
//! lives in [`math`] and is independent of storage. [`report`] builds a
//! read-only view of an epic's progress.

pub mod engine;
pub mod error;
pub mod math;
pub mod report;

pub use engine::{Completion, RiskOutcome, ScoringEngine};
pub use error::EngineError;
pub use report::{EpicReport, RiskLine, RoleLine};
