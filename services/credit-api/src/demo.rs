use crate::infra::InMemoryScoreSource;
use chrono::{Local, NaiveDate};
use clap::Args;
use credit_engine::error::AppError;
use credit_engine::lending::amortization::{estimate, schedule};
use credit_engine::lending::{
    ApplicantId, ApplicantProfile, ApprovalAction, CreditEngine, Identity, LendingError,
    LendingPolicy, RequestKind, ScoreAssessment, SettlementOutcome, TakeLoanRequest,
};
use serde_json::json;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EstimateArgs {
    /// Principal to borrow
    #[arg(long)]
    pub(crate) principal: f64,
    /// Annual interest rate in percent (defaults to the lending policy APR)
    #[arg(long)]
    pub(crate) rate: Option<f64>,
    /// Tenure in months
    #[arg(long, default_value_t = 12)]
    pub(crate) tenure: u32,
    /// Print the month-by-month repayment schedule
    #[arg(long)]
    pub(crate) schedule: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Business date for the walkthrough (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Amount requested by the sample borrower
    #[arg(long, default_value_t = 60_000)]
    pub(crate) amount: i64,
}

pub(crate) fn run_estimate(args: EstimateArgs) -> Result<(), AppError> {
    let rate = args
        .rate
        .unwrap_or_else(|| LendingPolicy::default().default_apr);
    let summary = estimate(args.principal, rate, args.tenure).map_err(LendingError::from)?;

    println!(
        "Loan of {:.0} at {rate}% over {} months",
        args.principal, args.tenure
    );
    println!("- Monthly installment: {}", summary.installment);
    println!("- Total payable: {}", summary.total_payable);
    println!(
        "- Total interest: {}",
        summary.total_payable.saturating_sub(args.principal.round() as u64)
    );

    if args.schedule {
        println!("\nMonth | Installment | Interest | Principal | Balance");
        for row in schedule(args.principal, rate, args.tenure).map_err(LendingError::from)? {
            println!(
                "{:>5} | {:>11.2} | {:>8.2} | {:>9.2} | {:>10.2}",
                row.period, row.installment, row.interest, row.principal, row.closing_balance
            );
        }
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let borrower = Identity {
        applicant_id: ApplicantId::canonical("1"),
        is_admin: false,
    };
    let approver = Identity {
        applicant_id: ApplicantId("demo-approver".to_string()),
        is_admin: true,
    };

    let source = demo_score_source(&borrower.applicant_id);
    let engine = CreditEngine::new(Arc::new(source), LendingPolicy::default());

    println!("Loan lifecycle demo ({today})");
    let application = engine.take_loan(
        &borrower,
        TakeLoanRequest {
            category: "general".to_string(),
            amount: args.amount,
            tenure_months: Some(12),
            purpose: "Workshop equipment".to_string(),
            employment_type: "self_employed".to_string(),
            income: 85_000,
        },
    )?;
    let loan_id = application.loan.id.clone();
    println!(
        "- Requested {} as {} -> {} ({})",
        application.loan.principal,
        loan_id,
        application.approval.request_id,
        application.approval.status.label()
    );
    if let Some(estimate) = &application.loan.estimate {
        println!(
            "  Installment {} | total payable {}",
            estimate.installment, estimate.total_payable
        );
    }

    engine.resolve(
        &borrower.applicant_id,
        RequestKind::Loan,
        &application.approval.request_id,
        ApprovalAction::Approve,
        &approver,
        today,
    )?;
    for loan in engine.loans(&borrower) {
        println!(
            "- Approved {}: outstanding {} ({})",
            loan.id, loan.outstanding, loan.status
        );
    }

    let installment = application
        .loan
        .estimate
        .as_ref()
        .map(|estimate| estimate.installment as i64)
        .unwrap_or(args.amount / 2);
    match engine.settle(&borrower, &loan_id, installment, today)? {
        SettlementOutcome::Committed(settlement) => {
            println!(
                "- Paid {} -> remaining {}",
                installment, settlement.remaining_balance
            );
        }
        SettlementOutcome::Pending {
            approval,
            remaining_balance,
        } => {
            println!(
                "- Payment of {installment} queued as {} (balance still {remaining_balance})",
                approval.request_id
            );
            let resolved = engine.resolve(
                &borrower.applicant_id,
                RequestKind::Settlement,
                &approval.request_id,
                ApprovalAction::Approve,
                &approver,
                today,
            )?;
            let remaining = engine
                .ledger()
                .get(&loan_id)
                .map(|loan| loan.outstanding)
                .unwrap_or(remaining_balance);
            println!(
                "  {} {} -> remaining {remaining}",
                resolved.request_id,
                resolved.status.label()
            );
        }
    }

    let report = engine.evaluation(&borrower.applicant_id)?;
    let evaluation = &report.evaluation;
    println!(
        "\nEvaluation {} for {}",
        evaluation.evaluation_id, report.applicant.full_name
    );
    println!(
        "- Score {} | band {:?} ({}) | default probability {:.1}%",
        evaluation
            .credit_score
            .map(|score| format!("{score:.0}"))
            .unwrap_or_else(|| "n/a".to_string()),
        evaluation.risk_band,
        evaluation.band_label,
        evaluation.default_probability_percent
    );
    println!(
        "- Recommendation {:?} | max loan {} | max tenure {} months | APR {}%",
        evaluation.approval_recommendation,
        evaluation.limits.max_loan,
        evaluation.limits.max_tenure_months,
        evaluation.limits.interest_apr
    );
    for factor in &evaluation.breakdown {
        println!(
            "  {:<32} {:>3}/100  {:>5.1} of {} pts",
            factor.label, factor.value, factor.points, factor.max_points
        );
    }
    for note in evaluation
        .positive_factors
        .iter()
        .chain(&evaluation.negative_factors)
    {
        println!("  * {note}");
    }
    for issue in &evaluation.data_quality_issues {
        println!("  Data quality: {issue}");
    }

    let dashboard = engine.dashboard(&borrower);
    println!("\nBorrower dashboard");
    println!(
        "- {} | utilization {:.1}%",
        dashboard.stats.score_band, dashboard.stats.utilization
    );
    for factor in &dashboard.key_factors {
        println!("  {}: {}", factor.label, factor.value);
    }
    for alert in &dashboard.alerts {
        println!("  [{:?}] {}", alert.level, alert.message);
    }
    for record in &dashboard.recent_activity {
        println!(
            "  {} {} {} ({:?})",
            record.recorded_on, record.title, record.amount, record.status
        );
    }

    Ok(())
}

fn demo_score_source(applicant: &ApplicantId) -> InMemoryScoreSource {
    let source = InMemoryScoreSource::default();
    source.insert_profile(ApplicantProfile {
        id: applicant.clone(),
        full_name: "Meera Nair".to_string(),
        phone: None,
        address: Some("Kochi".to_string()),
        monthly_income: Some(85_000),
        employment_type: Some("self_employed".to_string()),
    });
    source.insert_assessment(
        applicant,
        ScoreAssessment {
            credit_score: Some(712.0),
            risk_band: Some("low".to_string()),
            default_probability_percent: Some(4.2),
            loan_approval_recommendation: Some("APPROVE".to_string()),
            decision: None,
            factors: [
                ("payment_history", json!(88)),
                ("credit_age", json!(52)),
                ("income_stability", json!(76)),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect(),
        },
    );
    source.insert_history(
        applicant,
        vec![
            json!({"month": "Jan", "score": 688}),
            json!({"month": "Feb", "score": 701}),
            json!({"month": "Mar", "score": 712}),
        ],
    );
    source
}
