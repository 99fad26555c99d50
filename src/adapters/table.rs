//! Report Rendering - Text Tables and JSON
//!
//! Money is rounded to cents through `Decimal`; fractions and share
//! counts are shown with four decimals. Events are numbered from 1.

use anyhow::Result;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde_json::json;
use tabled::{Table, Tabled};

use crate::domain::report::{AllocationReport, EventPosition, PositionSide};
use crate::usecases::training_loop::RunOutcome;

#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct PositionRow {
    #[tabled(rename = "Event")]
    event: usize,
    #[tabled(rename = "Position")]
    position: String,
    #[tabled(rename = "Capital")]
    capital: String,
    #[tabled(rename = "Alpha Yes")]
    alpha_yes: String,
    #[tabled(rename = "Alpha No")]
    alpha_no: String,
}

/// Dollar amount rounded to cents, e.g. `$12.35`.
pub fn money(value: f64) -> String {
    match Decimal::from_f64(value) {
        Some(d) => {
            let cents = d.round_dp(2);
            let cents = if cents.is_zero() { Decimal::ZERO } else { cents };
            format!("${cents:.2}")
        }
        None => format!("${value}"),
    }
}

fn fraction(value: f64) -> String {
    format!("{value:.4}")
}

fn position_label(pos: &EventPosition) -> String {
    match pos.side {
        PositionSide::Flat => fraction(0.0),
        side => format!("{:.4} {side}", pos.shares),
    }
}

/// Aggregate figures as a two-column table.
pub fn summary_table(report: &AllocationReport) -> String {
    let rows = vec![
        SummaryRow {
            metric: "Initial Wealth",
            value: money(report.wealth),
        },
        SummaryRow {
            metric: "Yes Fraction (f_yes)",
            value: fraction(report.f_yes),
        },
        SummaryRow {
            metric: "No Fraction (f_no)",
            value: fraction(report.f_no),
        },
        SummaryRow {
            metric: "Total Yes Cost",
            value: money(report.total_yes_cost),
        },
        SummaryRow {
            metric: "Total No Cost",
            value: money(report.total_no_cost),
        },
        SummaryRow {
            metric: "Net Capital Deployed",
            value: money(report.net_capital_deployed),
        },
        SummaryRow {
            metric: "Cash from Hedge Cancel",
            value: money(report.cash_from_cancel),
        },
        SummaryRow {
            metric: "Unallocated Cash",
            value: money(report.unallocated_cash),
        },
    ];
    Table::new(rows).to_string()
}

/// One row per event, in input order.
pub fn positions_table(report: &AllocationReport) -> String {
    let rows: Vec<PositionRow> = report
        .positions
        .iter()
        .map(|p| PositionRow {
            event: p.event + 1,
            position: position_label(p),
            capital: money(p.capital),
            alpha_yes: fraction(p.alpha_yes),
            alpha_no: fraction(p.alpha_no),
        })
        .collect();
    Table::new(rows).to_string()
}

/// Both tables, separated by a blank line.
pub fn render_report(report: &AllocationReport) -> String {
    format!("{}\n\n{}", summary_table(report), positions_table(report))
}

/// Machine-readable outcome.
///
/// # Errors
/// Returns an error if serialization fails.
pub fn render_json(outcome: &RunOutcome) -> Result<String> {
    let value = match outcome {
        RunOutcome::Rejected(err) => json!({
            "state": "rejected",
            "error": err.to_string(),
        }),
        RunOutcome::Converged {
            summary,
            report,
            final_expected_log_return,
            ..
        } => json!({
            "state": "converged",
            "run": summary,
            // serde_json has no NaN; a zero-iteration run reports null
            "expected_log_return": final_expected_log_return.is_finite().then_some(*final_expected_log_return),
            "report": report,
        }),
        RunOutcome::Diverged { summary, iteration } => json!({
            "state": "diverged",
            "run": summary,
            "iteration": iteration,
        }),
        RunOutcome::Failed {
            summary,
            iteration,
            error,
        } => json!({
            "state": "failed",
            "run": summary,
            "iteration": iteration,
            "error": error,
        }),
    };
    Ok(serde_json::to_string_pretty(&value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    use crate::domain::allocation::AllocationParameters;
    use crate::domain::market::MarketModel;

    fn report(prices: Vec<f64>, probs: Vec<f64>) -> AllocationReport {
        let n = prices.len();
        let market = MarketModel::new(prices, probs).unwrap();
        AllocationReport::compile(&AllocationParameters::zeros(n), &market, 100.0).unwrap()
    }

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(money(12.345_6), "$12.35");
        assert_eq!(money(100.0), "$100.00");
        assert_eq!(money(-0.000_01), "$0.00");
    }

    #[test]
    fn test_money_rounds_half_to_even() {
        let d = Decimal::from_f64(0.125).map(|d| d.round_dp(2));
        assert_eq!(d, Some(dec!(0.12)));
        assert_eq!(money(0.125), "$0.12");
        assert_eq!(money(0.375), "$0.38");
    }

    #[test]
    fn test_money_non_finite() {
        assert_eq!(money(f64::NAN), "$NaN");
    }

    #[test]
    fn test_positions_are_numbered_from_one() {
        let text = positions_table(&report(vec![0.3, 0.5], vec![0.6, 0.5]));
        assert!(text.contains("Alpha Yes"));
        assert!(text.contains(" 1 "));
        assert!(text.contains(" 2 "));
        assert!(text.contains(" Yes"));
        assert!(text.contains("0.0000"));
    }

    #[test]
    fn test_summary_contains_all_metrics() {
        let text = summary_table(&report(vec![0.5], vec![0.5]));
        for label in [
            "Initial Wealth",
            "Net Capital Deployed",
            "Cash from Hedge Cancel",
            "Unallocated Cash",
        ] {
            assert!(text.contains(label), "missing {label}");
        }
        assert!(text.contains("$100.00"));
    }

    #[test]
    fn test_rejected_json() {
        let outcome = RunOutcome::Rejected(crate::domain::error::InputError::Empty {
            prices: 0,
            probabilities: 0,
        });
        let text = render_json(&outcome).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["state"], "rejected");
    }
}
