use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use super::approvals::{ApprovalAction, ApprovalRequest, ApprovalWorkflow, RequestKind};
use super::domain::{
    ApplicantId, Identity, Loan, LoanId, LoanSummary, PaymentRecord, RequestId, TakeLoanRequest,
};
use super::error::LendingError;
use super::evaluation::{DashboardSummary, EvaluationAggregator, EvaluationReport};
use super::ledger::{LendingPolicy, LoanLedger, Settlement};
use super::repository::ScoreSource;
use super::risk::RiskPolicy;

/// Facade composing the ledger, the approval workflow and the evaluation aggregator.
pub struct CreditEngine<S> {
    ledger: Arc<LoanLedger>,
    workflow: Arc<ApprovalWorkflow>,
    aggregator: EvaluationAggregator<S>,
}

/// A newly recorded loan together with the request that gates it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanApplication {
    pub loan: Loan,
    pub approval: ApprovalRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Committed(Settlement),
    /// Queued for sign-off; the balance is unchanged until approval.
    Pending {
        approval: ApprovalRequest,
        remaining_balance: u64,
    },
}

impl<S> CreditEngine<S>
where
    S: ScoreSource + 'static,
{
    pub fn new(source: Arc<S>, policy: LendingPolicy) -> Self {
        Self::with_risk_policy(source, policy, RiskPolicy::default())
    }

    pub fn with_risk_policy(source: Arc<S>, policy: LendingPolicy, risk: RiskPolicy) -> Self {
        let ledger = Arc::new(LoanLedger::new(policy));
        let workflow = Arc::new(ApprovalWorkflow::new(Arc::clone(&ledger)));
        let aggregator =
            EvaluationAggregator::new(source, Arc::clone(&ledger), Arc::clone(&workflow), risk);

        Self {
            ledger,
            workflow,
            aggregator,
        }
    }

    pub fn ledger(&self) -> &LoanLedger {
        &self.ledger
    }

    pub fn workflow(&self) -> &ApprovalWorkflow {
        &self.workflow
    }

    /// Record a loan for the caller and queue it for approval.
    pub fn take_loan(
        &self,
        identity: &Identity,
        request: TakeLoanRequest,
    ) -> Result<LoanApplication, LendingError> {
        let loan = self.ledger.take_loan(&identity.applicant_id, request)?;
        let approval = self.workflow.submit_loan(&loan);
        Ok(LoanApplication { loan, approval })
    }

    pub fn loans(&self, identity: &Identity) -> Vec<LoanSummary> {
        self.ledger
            .loans(&identity.applicant_id)
            .iter()
            .map(Loan::summary)
            .collect()
    }

    /// Settle against one of the caller's loans, either directly or through the approval
    /// queue depending on the lending policy.
    pub fn settle(
        &self,
        identity: &Identity,
        loan_id: &LoanId,
        amount: i64,
        today: NaiveDate,
    ) -> Result<SettlementOutcome, LendingError> {
        let loan = self.owned_loan(identity, loan_id)?;

        if self.ledger.policy().settlement_requires_approval {
            let approval = self
                .workflow
                .submit_settlement(&identity.applicant_id, loan_id, amount)?;
            return Ok(SettlementOutcome::Pending {
                approval,
                remaining_balance: loan.outstanding,
            });
        }

        let settlement = self.ledger.settle(loan_id, amount, today)?;
        Ok(SettlementOutcome::Committed(settlement))
    }

    pub fn history(&self, identity: &Identity) -> Vec<PaymentRecord> {
        self.ledger.history(&identity.applicant_id)
    }

    pub fn dashboard(&self, identity: &Identity) -> DashboardSummary {
        self.aggregator.dashboard(&identity.applicant_id)
    }

    pub fn evaluation(&self, applicant: &ApplicantId) -> Result<EvaluationReport, LendingError> {
        self.aggregator.evaluation(applicant)
    }

    pub fn resolve(
        &self,
        applicant: &ApplicantId,
        kind: RequestKind,
        request_id: &RequestId,
        action: ApprovalAction,
        actor: &Identity,
        today: NaiveDate,
    ) -> Result<ApprovalRequest, LendingError> {
        self.workflow.resolve(
            applicant,
            kind,
            request_id,
            action,
            actor.applicant_id.as_str(),
            today,
        )
    }

    /// Flag loans past their due date. Called periodically by the service shell.
    pub fn refresh_statuses(&self, today: NaiveDate) -> Vec<LoanId> {
        self.ledger.mark_overdue(today)
    }

    fn owned_loan(&self, identity: &Identity, loan_id: &LoanId) -> Result<Loan, LendingError> {
        let loan = self.ledger.get(loan_id)?;
        if loan.owner != identity.applicant_id {
            return Err(LendingError::not_found("loan", loan_id));
        }
        Ok(loan)
    }
}
