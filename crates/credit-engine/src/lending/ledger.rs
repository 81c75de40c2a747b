use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use super::amortization::{self, AmortizationEstimate};
use super::domain::{
    ApplicantId, Confirmation, EmploymentType, Loan, LoanCategory, LoanId, LoanStatus,
    PaymentId, PaymentKind, PaymentRecord, PaymentStatus, TakeLoanRequest,
};
use super::error::LendingError;
use super::locks::{lock, read, write};

pub const MIN_TENURE_MONTHS: u32 = 3;
pub const MAX_TENURE_MONTHS: u32 = 60;
/// Largest principal a single loan may carry.
pub const MAX_PRINCIPAL: u64 = 1_000_000_000_000;

/// Ledger-wide lending settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LendingPolicy {
    /// APR applied to new loans and their installment estimates.
    pub default_apr: f64,
    /// Days from confirmation until the first settlement is due.
    pub due_days: u32,
    /// When set, borrower settlements are queued for approval instead of committed.
    pub settlement_requires_approval: bool,
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            default_apr: 14.0,
            due_days: 30,
            settlement_requires_approval: true,
        }
    }
}

/// Result of a committed settlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub loan_id: LoanId,
    pub remaining_balance: u64,
    pub closed: bool,
    pub payment: PaymentRecord,
}

/// Sum of principal and outstanding over an account's open loans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exposure {
    pub total_principal: u64,
    pub total_outstanding: u64,
}

impl Exposure {
    /// Adds one loan's figures, pinning at `u64::MAX` instead of wrapping.
    pub fn accumulate(self, principal: u64, outstanding: u64) -> Self {
        Self {
            total_principal: self.total_principal.saturating_add(principal),
            total_outstanding: self.total_outstanding.saturating_add(outstanding),
        }
    }

    pub fn utilization_pct(&self) -> f64 {
        if self.total_principal == 0 {
            return 0.0;
        }
        self.total_outstanding as f64 / self.total_principal as f64 * 100.0
    }
}

type Shared<T> = Arc<Mutex<T>>;

/// In-memory loan store. Each loan sits behind its own lock so that settlement checks and
/// writes against one loan are serialized while other loans proceed independently.
pub struct LoanLedger {
    policy: LendingPolicy,
    loans: RwLock<HashMap<LoanId, Shared<Loan>>>,
    payments: RwLock<HashMap<ApplicantId, Shared<Vec<PaymentRecord>>>>,
    loan_sequence: AtomicU64,
    payment_sequence: AtomicU64,
}

impl LoanLedger {
    pub fn new(policy: LendingPolicy) -> Self {
        Self {
            policy,
            loans: RwLock::new(HashMap::new()),
            payments: RwLock::new(HashMap::new()),
            loan_sequence: AtomicU64::new(1),
            payment_sequence: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &LendingPolicy {
        &self.policy
    }

    /// Validate a take-loan request and record the loan, awaiting confirmation.
    pub fn take_loan(
        &self,
        owner: &ApplicantId,
        request: TakeLoanRequest,
    ) -> Result<Loan, LendingError> {
        let terms = validate_request(&request)?;

        let estimate = match terms.tenure_months {
            Some(tenure) => Some(self.estimate(terms.principal, tenure)?),
            None => None,
        };

        let id = LoanId(format!(
            "LN-{:06}",
            self.loan_sequence.fetch_add(1, Ordering::Relaxed)
        ));
        let loan = Loan {
            id: id.clone(),
            owner: owner.clone(),
            category: terms.category,
            principal: terms.principal,
            tenure_months: terms.tenure_months,
            interest_apr: self.policy.default_apr,
            outstanding: terms.principal,
            status: LoanStatus::Active,
            confirmation: Confirmation::Pending,
            purpose: request.purpose.trim().to_string(),
            borrower_income: terms.income,
            borrower_employment_type: terms.employment_type,
            estimate,
            created_at: Utc::now(),
            due_on: None,
        };

        write(&self.loans).insert(id, Arc::new(Mutex::new(loan.clone())));
        info!(loan_id = %loan.id, owner = %owner, principal = loan.principal, category = ?loan.category, "loan recorded");
        Ok(loan)
    }

    /// Reduce the outstanding balance by `amount`, closing the loan at exactly zero.
    pub fn settle(
        &self,
        loan_id: &LoanId,
        amount: i64,
        today: NaiveDate,
    ) -> Result<Settlement, LendingError> {
        let entry = self.entry(loan_id)?;
        let mut loan = lock(&entry);

        let amount = check_settlement(&loan, amount)?;

        let status = match loan.due_on {
            Some(due_on) if today > due_on => PaymentStatus::Late,
            _ => PaymentStatus::OnTime,
        };
        let payment = self.payment(&loan, amount, PaymentKind::Settlement, status, today);

        loan.outstanding -= amount;
        if loan.outstanding == 0 {
            loan.status = LoanStatus::Closed;
        }
        self.append_payment(payment.clone());

        info!(
            loan_id = %loan.id,
            amount,
            remaining = loan.outstanding,
            closed = loan.status == LoanStatus::Closed,
            "settlement committed"
        );

        Ok(Settlement {
            loan_id: loan.id.clone(),
            remaining_balance: loan.outstanding,
            closed: loan.status == LoanStatus::Closed,
            payment,
        })
    }

    /// Activate a loan after approval and record the disbursement.
    pub fn confirm(&self, loan_id: &LoanId, today: NaiveDate) -> Result<Loan, LendingError> {
        let entry = self.entry(loan_id)?;
        let mut loan = lock(&entry);

        if loan.confirmation == Confirmation::Confirmed {
            return Err(LendingError::validation("loanId", "loan is already confirmed"));
        }

        let payment = self.payment(
            &loan,
            loan.principal,
            PaymentKind::Disbursement,
            PaymentStatus::Disbursed,
            today,
        );
        loan.confirmation = Confirmation::Confirmed;
        loan.due_on = Some(today + Duration::days(i64::from(self.policy.due_days)));
        self.append_payment(payment);

        info!(loan_id = %loan.id, due_on = ?loan.due_on, "loan confirmed");
        Ok(loan.clone())
    }

    /// Flag confirmed loans whose due date has passed with a balance still owed.
    pub fn mark_overdue(&self, today: NaiveDate) -> Vec<LoanId> {
        let entries: Vec<Shared<Loan>> = read(&self.loans).values().cloned().collect();

        let mut flagged = Vec::new();
        for entry in entries {
            let mut loan = lock(&entry);
            let overdue = matches!(loan.due_on, Some(due_on) if due_on < today);
            if loan.confirmation == Confirmation::Confirmed
                && loan.status == LoanStatus::Active
                && loan.outstanding > 0
                && overdue
            {
                loan.status = LoanStatus::Late;
                flagged.push(loan.id.clone());
            }
        }

        flagged.sort();
        if !flagged.is_empty() {
            info!(count = flagged.len(), "loans flagged late");
        }
        flagged
    }

    pub fn get(&self, loan_id: &LoanId) -> Result<Loan, LendingError> {
        let entry = self.entry(loan_id)?;
        let loan = lock(&entry).clone();
        Ok(loan)
    }

    /// Confirmed loans for an account, newest first.
    pub fn loans(&self, owner: &ApplicantId) -> Vec<Loan> {
        let mut loans: Vec<Loan> = self
            .snapshot(owner)
            .into_iter()
            .filter(|loan| loan.confirmation == Confirmation::Confirmed)
            .collect();
        loans.sort_by(|a, b| b.id.cmp(&a.id));
        loans
    }

    /// Confirmed loans that still carry a balance.
    pub fn open_loans(&self, owner: &ApplicantId) -> Vec<Loan> {
        self.loans(owner)
            .into_iter()
            .filter(|loan| loan.status != LoanStatus::Closed)
            .collect()
    }

    pub fn exposure(&self, owner: &ApplicantId) -> Exposure {
        self.open_loans(owner)
            .iter()
            .fold(Exposure::default(), |exposure, loan| {
                exposure.accumulate(loan.principal, loan.outstanding)
            })
    }

    /// Payment records for an account in the order they were written.
    pub fn history(&self, owner: &ApplicantId) -> Vec<PaymentRecord> {
        let entry = read(&self.payments).get(owner).cloned();
        match entry {
            Some(records) => lock(&records).clone(),
            None => Vec::new(),
        }
    }

    fn estimate(&self, principal: u64, tenure: u32) -> Result<AmortizationEstimate, LendingError> {
        amortization::estimate(principal as f64, self.policy.default_apr, tenure).map_err(|err| {
            error!(error = %err, principal, tenure, "amortization rejected validated loan terms");
            LendingError::from(err)
        })
    }

    fn entry(&self, loan_id: &LoanId) -> Result<Shared<Loan>, LendingError> {
        read(&self.loans)
            .get(loan_id)
            .cloned()
            .ok_or_else(|| LendingError::not_found("loan", loan_id))
    }

    fn snapshot(&self, owner: &ApplicantId) -> Vec<Loan> {
        let entries: Vec<Shared<Loan>> = read(&self.loans).values().cloned().collect();
        entries
            .iter()
            .map(|entry| lock(entry).clone())
            .filter(|loan| &loan.owner == owner)
            .collect()
    }

    fn payment(
        &self,
        loan: &Loan,
        amount: u64,
        kind: PaymentKind,
        status: PaymentStatus,
        today: NaiveDate,
    ) -> PaymentRecord {
        PaymentRecord {
            id: PaymentId(format!(
                "PAY-{:06}",
                self.payment_sequence.fetch_add(1, Ordering::Relaxed)
            )),
            loan_id: loan.id.clone(),
            owner: loan.owner.clone(),
            title: loan.title(),
            amount,
            kind,
            status,
            recorded_on: today,
            recorded_at: Utc::now(),
        }
    }

    fn append_payment(&self, record: PaymentRecord) {
        let existing = read(&self.payments).get(&record.owner).cloned();
        let records = match existing {
            Some(records) => records,
            None => write(&self.payments)
                .entry(record.owner.clone())
                .or_default()
                .clone(),
        };
        lock(&records).push(record);
    }
}

struct LoanTerms {
    category: LoanCategory,
    principal: u64,
    tenure_months: Option<u32>,
    employment_type: EmploymentType,
    income: u64,
}

fn validate_request(request: &TakeLoanRequest) -> Result<LoanTerms, LendingError> {
    let category = LoanCategory::parse(&request.category).ok_or_else(|| {
        LendingError::validation("category", "must be one of general, emi, creditCardUsage")
    })?;

    let principal = u64::try_from(request.amount)
        .ok()
        .filter(|amount| *amount > 0)
        .ok_or_else(|| LendingError::validation("amount", "must be greater than 0"))?;
    if principal > MAX_PRINCIPAL {
        return Err(LendingError::validation(
            "amount",
            format!("must not exceed {MAX_PRINCIPAL}"),
        ));
    }

    let tenure_months = if category.requires_tenure() {
        match request.tenure_months {
            Some(tenure) if (MIN_TENURE_MONTHS..=MAX_TENURE_MONTHS).contains(&tenure) => {
                Some(tenure)
            }
            Some(_) => {
                return Err(LendingError::validation(
                    "tenureMonths",
                    format!("must be {MIN_TENURE_MONTHS}-{MAX_TENURE_MONTHS} months"),
                ))
            }
            None => {
                return Err(LendingError::validation(
                    "tenureMonths",
                    "is required for general and EMI loans",
                ))
            }
        }
    } else {
        None
    };

    if request.purpose.trim().is_empty() {
        return Err(LendingError::validation("purpose", "is required"));
    }

    let employment_type = EmploymentType::parse(&request.employment_type).ok_or_else(|| {
        LendingError::validation(
            "employmentType",
            format!("must be one of {}", EmploymentType::ALLOWED.join(", ")),
        )
    })?;

    let income = u64::try_from(request.income)
        .ok()
        .filter(|income| *income > 0)
        .ok_or_else(|| LendingError::validation("income", "must be greater than 0"))?;

    Ok(LoanTerms {
        category,
        principal,
        tenure_months,
        employment_type,
        income,
    })
}

/// Settlement guard shared by direct settlement and settlement-request submission.
pub(crate) fn check_settlement(loan: &Loan, amount: i64) -> Result<u64, LendingError> {
    if loan.confirmation != Confirmation::Confirmed {
        return Err(LendingError::validation("loanId", "loan is awaiting approval"));
    }
    if loan.status == LoanStatus::Closed {
        return Err(LendingError::validation("loanId", "loan is already closed"));
    }

    let amount = u64::try_from(amount)
        .ok()
        .filter(|amount| *amount > 0)
        .ok_or_else(|| LendingError::validation("amount", "must be greater than 0"))?;

    if amount > loan.outstanding {
        return Err(LendingError::validation(
            "amount",
            format!(
                "payment of {amount} exceeds outstanding balance of {}",
                loan.outstanding
            ),
        ));
    }

    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(category: &str, amount: i64, tenure: Option<u32>) -> TakeLoanRequest {
        TakeLoanRequest {
            category: category.to_string(),
            amount,
            tenure_months: tenure,
            purpose: "Laptop".to_string(),
            employment_type: "salaried".to_string(),
            income: 85_000,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date")
    }

    fn confirmed_loan(ledger: &LoanLedger, amount: i64) -> Loan {
        let owner = ApplicantId::canonical("1");
        let loan = ledger
            .take_loan(&owner, request("general", amount, Some(12)))
            .expect("loan recorded");
        ledger.confirm(&loan.id, today()).expect("confirmed")
    }

    #[test]
    fn take_loan_attaches_estimate_for_amortizing_categories() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");

        let loan = ledger
            .take_loan(&owner, request("general", 100_000, Some(12)))
            .expect("loan recorded");
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.outstanding, 100_000);
        assert_eq!(loan.confirmation, Confirmation::Pending);
        assert_eq!(loan.estimate.map(|estimate| estimate.installment), Some(8_979));

        let card = ledger
            .take_loan(&owner, request("cc", 4_000, None))
            .expect("card usage recorded");
        assert!(card.estimate.is_none());
        assert!(card.tenure_months.is_none());
    }

    #[test]
    fn tenure_outside_range_is_rejected_on_the_tenure_field() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");

        for tenure in [Some(2), Some(61), None] {
            match ledger.take_loan(&owner, request("general", 10_000, tenure)) {
                Err(LendingError::Validation { field, .. }) => assert_eq!(field, "tenureMonths"),
                other => panic!("expected tenure validation error, got {other:?}"),
            }
        }
        assert!(ledger.snapshot(&owner).is_empty(), "no partial record is written");
        assert!(ledger
            .take_loan(&owner, request("emi", 10_000, Some(12)))
            .is_ok());
    }

    #[test]
    fn each_invalid_field_is_named() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");

        let mut bad_category = request("mortgage", 10_000, Some(12));
        let mut bad_amount = request("general", 0, Some(12));
        let mut bad_purpose = request("general", 10_000, Some(12));
        let mut bad_employment = request("general", 10_000, Some(12));
        let mut bad_income = request("general", 10_000, Some(12));
        bad_category.category = "mortgage".to_string();
        bad_amount.amount = -50;
        bad_purpose.purpose = "   ".to_string();
        bad_employment.employment_type = "astronaut".to_string();
        bad_income.income = 0;

        for (request, expected) in [
            (bad_category, "category"),
            (bad_amount, "amount"),
            (bad_purpose, "purpose"),
            (bad_employment, "employmentType"),
            (bad_income, "income"),
        ] {
            match ledger.take_loan(&owner, request) {
                Err(LendingError::Validation { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected validation error on {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn partial_settlement_reduces_balance_and_keeps_status() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 10_000);

        let settlement = ledger.settle(&loan.id, 2_500, today()).expect("settles");
        assert_eq!(settlement.remaining_balance, 7_500);
        assert!(!settlement.closed);
        assert_eq!(ledger.get(&loan.id).expect("exists").status, LoanStatus::Active);
        assert_eq!(settlement.payment.status, PaymentStatus::OnTime);
    }

    #[test]
    fn settling_exact_outstanding_closes_the_loan() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 10_000);

        ledger.settle(&loan.id, 4_000, today()).expect("first settlement");
        let settlement = ledger.settle(&loan.id, 6_000, today()).expect("final settlement");
        assert_eq!(settlement.remaining_balance, 0);
        assert!(settlement.closed);
        assert_eq!(ledger.get(&loan.id).expect("exists").status, LoanStatus::Closed);
    }

    #[test]
    fn overpayment_is_rejected_without_mutation() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 10_000);
        let history_before = ledger.history(&loan.owner).len();

        match ledger.settle(&loan.id, 10_001, today()) {
            Err(LendingError::Validation { field, .. }) => assert_eq!(field, "amount"),
            other => panic!("expected overpayment rejection, got {other:?}"),
        }
        assert!(matches!(
            ledger.settle(&loan.id, 0, today()),
            Err(LendingError::Validation { .. })
        ));

        let unchanged = ledger.get(&loan.id).expect("exists");
        assert_eq!(unchanged.outstanding, 10_000);
        assert_eq!(ledger.history(&loan.owner).len(), history_before);
    }

    #[test]
    fn unknown_loan_is_not_found() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        assert!(matches!(
            ledger.settle(&LoanId("LN-999999".to_string()), 10, today()),
            Err(LendingError::NotFound { .. })
        ));
    }

    #[test]
    fn unconfirmed_loans_cannot_be_settled() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");
        let loan = ledger
            .take_loan(&owner, request("general", 5_000, Some(6)))
            .expect("recorded");
        assert!(matches!(
            ledger.settle(&loan.id, 100, today()),
            Err(LendingError::Validation { field: "loanId", .. })
        ));
    }

    #[test]
    fn concurrent_settlements_never_overdraw() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 1_000);

        let successes = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| ledger.settle(&loan.id, 300, today()).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("thread completes"))
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 3);
        assert_eq!(ledger.get(&loan.id).expect("exists").outstanding, 100);
    }

    #[test]
    fn history_is_chronological_and_includes_disbursement() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 3_000);
        ledger.settle(&loan.id, 1_000, today()).expect("settles");
        ledger.settle(&loan.id, 500, today()).expect("settles");

        let history = ledger.history(&loan.owner);
        let kinds: Vec<_> = history.iter().map(|record| record.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PaymentKind::Disbursement,
                PaymentKind::Settlement,
                PaymentKind::Settlement
            ]
        );
        assert_eq!(history[1].amount, 1_000);
        assert_eq!(history[2].amount, 500);
        assert!(ledger.history(&ApplicantId::canonical("2")).is_empty());
    }

    #[test]
    fn overdue_loans_turn_late_and_late_settlements_are_marked() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let loan = confirmed_loan(&ledger, 2_000);
        let due_on = loan.due_on.expect("due date set on confirmation");
        assert_eq!(due_on, today() + Duration::days(30));

        assert!(ledger.mark_overdue(due_on).is_empty());
        let after_due = due_on + Duration::days(1);
        assert_eq!(ledger.mark_overdue(after_due), vec![loan.id.clone()]);
        assert_eq!(ledger.get(&loan.id).expect("exists").status, LoanStatus::Late);

        let partial = ledger.settle(&loan.id, 500, after_due).expect("settles");
        assert_eq!(partial.payment.status, PaymentStatus::Late);
        assert_eq!(ledger.get(&loan.id).expect("exists").status, LoanStatus::Late);

        let last = ledger.settle(&loan.id, 1_500, after_due).expect("settles");
        assert!(last.closed);
        assert_eq!(ledger.get(&loan.id).expect("exists").status, LoanStatus::Closed);
    }

    #[test]
    fn exposure_tracks_open_loans_only() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let first = confirmed_loan(&ledger, 4_000);
        let second = confirmed_loan(&ledger, 6_000);
        ledger.settle(&first.id, 4_000, today()).expect("closes");
        ledger.settle(&second.id, 3_000, today()).expect("settles");

        let exposure = ledger.exposure(&first.owner);
        assert_eq!(exposure.total_principal, 6_000);
        assert_eq!(exposure.total_outstanding, 3_000);
        assert!((exposure.utilization_pct() - 50.0).abs() < f64::EPSILON);
        assert_eq!(ledger.loans(&first.owner).len(), 2);
        assert_eq!(ledger.open_loans(&first.owner).len(), 1);
    }

    #[test]
    fn principal_above_the_ceiling_is_rejected() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");

        for amount in [MAX_PRINCIPAL as i64 + 1, i64::MAX] {
            match ledger.take_loan(&owner, request("cc", amount, None)) {
                Err(LendingError::Validation { field, .. }) => assert_eq!(field, "amount"),
                other => panic!("expected amount validation error, got {other:?}"),
            }
        }
        assert!(ledger.snapshot(&owner).is_empty());

        let loan = ledger
            .take_loan(&owner, request("general", MAX_PRINCIPAL as i64, Some(60)))
            .expect("ceiling itself is accepted");
        assert!(loan.estimate.is_some());
    }

    #[test]
    fn exposure_saturates_instead_of_wrapping() {
        let nearly_full = Exposure {
            total_principal: u64::MAX - 5,
            total_outstanding: u64::MAX - 5,
        };
        let exposure = nearly_full.accumulate(10, 3);
        assert_eq!(exposure.total_principal, u64::MAX);
        assert_eq!(exposure.total_outstanding, u64::MAX - 2);
        assert!(exposure.utilization_pct() <= 100.0);
    }

    #[test]
    fn exposure_over_many_ceiling_loans_stays_exact() {
        let ledger = LoanLedger::new(LendingPolicy::default());
        let owner = ApplicantId::canonical("1");
        for _ in 0..3 {
            let loan = ledger
                .take_loan(&owner, request("cc", MAX_PRINCIPAL as i64, None))
                .expect("loan recorded");
            ledger.confirm(&loan.id, today()).expect("confirmed");
        }

        let exposure = ledger.exposure(&owner);
        assert_eq!(exposure.total_principal, 3 * MAX_PRINCIPAL);
        assert_eq!(exposure.total_outstanding, 3 * MAX_PRINCIPAL);
    }
}
