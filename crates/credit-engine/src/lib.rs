//! Loan lifecycle and credit-risk evaluation engine.
//!
//! [`lending`] holds the domain: amortization, risk classification, score-trend
//! normalization, the loan ledger, the approval workflow, and the evaluation read model.
//! [`config`], [`error`], and [`telemetry`] carry the service plumbing shared with the
//! API binary.

pub mod config;
pub mod error;
pub mod lending;
pub mod telemetry;
