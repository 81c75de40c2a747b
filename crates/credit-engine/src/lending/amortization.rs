//! Reducing-balance EMI estimation.

use serde::{Deserialize, Serialize};

/// Installment estimate in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmortizationEstimate {
    pub installment: u64,
    pub total_payable: u64,
    pub monthly_rate: f64,
}

impl AmortizationEstimate {
    pub fn total_interest(&self, principal: u64) -> u64 {
        self.total_payable.saturating_sub(principal)
    }
}

/// One month of a repayment schedule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub period: u32,
    pub installment: f64,
    pub interest: f64,
    pub principal: f64,
    pub closing_balance: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AmortizationError {
    #[error("invalid amortization input: principal must be positive, got {0}")]
    Principal(f64),
    #[error("invalid amortization input: annual rate must be non-negative, got {0}")]
    Rate(f64),
    #[error("invalid amortization input: tenure must be at least one month, got {0}")]
    Tenure(u32),
    #[error("amortization of {principal} over {tenure_months} months is not representable")]
    Overflow { principal: f64, tenure_months: u32 },
}

/// Monthly installment and total payable for `principal` at `annual_rate_percent` over
/// `tenure_months`. Both figures are rounded half-up to whole currency units.
pub fn estimate(
    principal: f64,
    annual_rate_percent: f64,
    tenure_months: u32,
) -> Result<AmortizationEstimate, AmortizationError> {
    validate(principal, annual_rate_percent, tenure_months)?;

    let overflow = || AmortizationError::Overflow {
        principal,
        tenure_months,
    };

    let monthly_rate = annual_rate_percent / 100.0 / 12.0;
    if monthly_rate == 0.0 {
        let installment = round_half_up(principal / f64::from(tenure_months));
        return Ok(AmortizationEstimate {
            installment: installment.ok_or_else(overflow)?,
            total_payable: round_half_up(principal).ok_or_else(overflow)?,
            monthly_rate,
        });
    }

    let installment = round_half_up(exact_installment(principal, monthly_rate, tenure_months))
        .ok_or_else(overflow)?;
    let total_payable = installment
        .checked_mul(u64::from(tenure_months))
        .ok_or_else(overflow)?;
    Ok(AmortizationEstimate {
        installment,
        total_payable,
        monthly_rate,
    })
}

/// Month-by-month schedule. The last row absorbs rounding drift so the balance ends at 0.
pub fn schedule(
    principal: f64,
    annual_rate_percent: f64,
    tenure_months: u32,
) -> Result<Vec<ScheduleRow>, AmortizationError> {
    let summary = estimate(principal, annual_rate_percent, tenure_months)?;
    let installment = summary.installment as f64;

    let mut balance = principal;
    let mut rows = Vec::with_capacity(tenure_months as usize);
    for period in 1..=tenure_months {
        let interest = round_cents(balance * summary.monthly_rate);
        let (payment, principal_part) = if period == tenure_months {
            (balance + interest, balance)
        } else {
            (installment, (installment - interest).min(balance))
        };
        balance = round_cents(balance - principal_part).max(0.0);

        rows.push(ScheduleRow {
            period,
            installment: round_cents(payment),
            interest,
            principal: round_cents(principal_part),
            closing_balance: balance,
        });
    }

    Ok(rows)
}

fn validate(
    principal: f64,
    annual_rate_percent: f64,
    tenure_months: u32,
) -> Result<(), AmortizationError> {
    if !principal.is_finite() || principal <= 0.0 {
        return Err(AmortizationError::Principal(principal));
    }
    if !annual_rate_percent.is_finite() || annual_rate_percent < 0.0 {
        return Err(AmortizationError::Rate(annual_rate_percent));
    }
    if tenure_months < 1 {
        return Err(AmortizationError::Tenure(tenure_months));
    }
    Ok(())
}

/// `(1 + r)^n - 1` is taken through `ln_1p`/`exp_m1` so that rates too small to move
/// `1 + r` away from 1.0 still yield a finite installment.
fn exact_installment(principal: f64, monthly_rate: f64, tenure_months: u32) -> f64 {
    let growth_minus_one = (f64::from(tenure_months) * monthly_rate.ln_1p()).exp_m1();
    principal * monthly_rate * (growth_minus_one + 1.0) / growth_minus_one
}

/// Half-up rounding to whole units; `None` when the value does not fit a `u64`.
fn round_half_up(value: f64) -> Option<u64> {
    let rounded = (value + 0.5).floor();
    (rounded.is_finite() && rounded >= 0.0 && rounded < u64::MAX as f64).then(|| rounded as u64)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
