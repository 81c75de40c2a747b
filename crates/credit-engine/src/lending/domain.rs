use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::amortization::AmortizationEstimate;

/// Applicant (account) identifier. Canonical form is `APP-00012`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl ApplicantId {
    /// Accepts `APP-12`, `app-00012`, or `12` as the same applicant; anything else is kept
    /// verbatim after trimming.
    pub fn canonical(raw: &str) -> Self {
        let trimmed = raw.trim();
        let digits = match trimmed.get(..4) {
            Some(prefix) if prefix.eq_ignore_ascii_case("APP-") => &trimmed[4..],
            _ => trimmed,
        };

        if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
            if let Ok(number) = digits.parse::<u64>() {
                return Self(format!("APP-{number:05}"));
            }
        }

        Self(trimmed.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(pub String);

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub String);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// Product line a loan was taken under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoanCategory {
    General,
    Emi,
    CreditCardUsage,
}

impl LoanCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Self::General),
            "emi" => Some(Self::Emi),
            "creditcardusage" | "credit_card_usage" | "cc" => Some(Self::CreditCardUsage),
            _ => None,
        }
    }

    /// General loans and EMIs amortize over a fixed tenure; card usage does not.
    pub const fn requires_tenure(self) -> bool {
        matches!(self, Self::General | Self::Emi)
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::General => "Loan General",
            Self::Emi => "Loan Emi",
            Self::CreditCardUsage => "Credit Card Usage",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Active,
    Late,
    Closed,
}

impl LoanStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Late => "LATE",
            LoanStatus::Closed => "CLOSED",
        }
    }
}

/// Whether an approver has signed off on the loan-creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confirmation {
    Pending,
    Confirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Student,
    Unemployed,
    Freelancer,
    Retired,
}

impl EmploymentType {
    pub const ALLOWED: &'static [&'static str] = &[
        "salaried",
        "self_employed",
        "student",
        "unemployed",
        "freelancer",
        "retired",
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "salaried" => Some(Self::Salaried),
            "self_employed" => Some(Self::SelfEmployed),
            "student" => Some(Self::Student),
            "unemployed" => Some(Self::Unemployed),
            "freelancer" => Some(Self::Freelancer),
            "retired" => Some(Self::Retired),
            _ => None,
        }
    }
}

/// Raw take-loan request as submitted by the borrower. Amounts are whole currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TakeLoanRequest {
    pub category: String,
    pub amount: i64,
    #[serde(default)]
    pub tenure_months: Option<u32>,
    pub purpose: String,
    pub employment_type: String,
    pub income: i64,
}

/// Ledger entity for a single loan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    pub id: LoanId,
    pub owner: ApplicantId,
    pub category: LoanCategory,
    pub principal: u64,
    pub tenure_months: Option<u32>,
    pub interest_apr: f64,
    pub outstanding: u64,
    pub status: LoanStatus,
    pub confirmation: Confirmation,
    pub purpose: String,
    pub borrower_income: u64,
    pub borrower_employment_type: EmploymentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<AmortizationEstimate>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_on: Option<NaiveDate>,
}

impl Loan {
    pub fn title(&self) -> &'static str {
        self.category.title()
    }

    pub fn summary(&self) -> LoanSummary {
        LoanSummary {
            id: self.id.clone(),
            title: self.title(),
            category: self.category,
            outstanding: self.outstanding,
            status: self.status.label(),
        }
    }
}

/// Listing view returned to borrowers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanSummary {
    pub id: LoanId,
    pub title: &'static str,
    pub category: LoanCategory,
    pub outstanding: u64,
    pub status: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Settlement,
    Disbursement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    OnTime,
    Late,
    Disbursed,
}

/// Append-only ledger line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub owner: ApplicantId,
    pub title: &'static str,
    pub amount: u64,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub recorded_on: NaiveDate,
    pub recorded_at: DateTime<Utc>,
}

/// Authenticated caller, resolved from a bearer credential before reaching the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub applicant_id: ApplicantId,
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_applicant_ids_collapse_numeric_forms() {
        assert_eq!(ApplicantId::canonical("APP-12").as_str(), "APP-00012");
        assert_eq!(ApplicantId::canonical(" app-00012 ").as_str(), "APP-00012");
        assert_eq!(ApplicantId::canonical("12").as_str(), "APP-00012");
        assert_eq!(ApplicantId::canonical("priya").as_str(), "priya");
        assert_eq!(ApplicantId::canonical("APP-").as_str(), "APP-");
    }

    #[test]
    fn category_parsing_accepts_wire_aliases() {
        assert_eq!(LoanCategory::parse("cc"), Some(LoanCategory::CreditCardUsage));
        assert_eq!(
            LoanCategory::parse("creditCardUsage"),
            Some(LoanCategory::CreditCardUsage)
        );
        assert_eq!(LoanCategory::parse(" EMI "), Some(LoanCategory::Emi));
        assert_eq!(LoanCategory::parse("mortgage"), None);
        assert!(LoanCategory::General.requires_tenure());
        assert!(!LoanCategory::CreditCardUsage.requires_tenure());
    }

    #[test]
    fn employment_type_is_a_closed_set() {
        assert_eq!(
            EmploymentType::parse("Self-Employed"),
            Some(EmploymentType::SelfEmployed)
        );
        assert_eq!(EmploymentType::parse("astronaut"), None);
        assert_eq!(EmploymentType::ALLOWED.len(), 6);
    }
}
