//! Loan lifecycle and credit-risk evaluation.
//!
//! The pure pieces (`amortization`, `risk`, `trend`) have no shared state. `ledger` and
//! `approvals` own the mutable records behind per-entity locks, `evaluation` composes
//! everything into read models, and `service` plus `router` expose the whole over HTTP.

pub mod amortization;
pub mod approvals;
pub mod domain;
pub mod error;
pub mod evaluation;
pub mod import;
pub mod ledger;
mod locks;
pub mod repository;
pub mod risk;
pub mod router;
pub mod service;
pub mod trend;

#[cfg(test)]
mod tests;

pub use amortization::{AmortizationError, AmortizationEstimate, ScheduleRow};
pub use approvals::{ApprovalAction, ApprovalRequest, ApprovalWorkflow, RequestKind, RequestStatus};
pub use domain::{
    ApplicantId, Confirmation, EmploymentType, Identity, Loan, LoanCategory, LoanId, LoanStatus,
    LoanSummary, PaymentId, PaymentKind, PaymentRecord, PaymentStatus, RequestId,
    TakeLoanRequest,
};
pub use error::LendingError;
pub use evaluation::{
    Alert, AlertLevel, DashboardStats, DashboardSummary, Evaluation, EvaluationAggregator,
    EvaluationReport, HistoryPoint,
};
pub use import::{ImportError, ScoreHistoryImporter};
pub use ledger::{Exposure, LendingPolicy, LoanLedger, Settlement};
pub use repository::{ApplicantProfile, IdentityResolver, ScoreAssessment, ScoreSource, SourceError};
pub use risk::{
    classify, FactorBreakdown, KeyFactor, LoanLimits, Recommendation, RiskAssessment, RiskBand,
    RiskPolicy, ScoreFactor,
};
pub use router::{lending_router, Money};
pub use service::{CreditEngine, LoanApplication, SettlementOutcome};
pub use trend::TrendPoint;
