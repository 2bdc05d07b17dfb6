use crate::error::Result;
use crate::transaction::TransactionRecord;
use crate::utils::{first_day_of_month, resolve_date_range, rolling_mean};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Under,
    Over,
}

impl BudgetStatus {
    /// Amounts are signed, so a positive delta means less was spent than
    /// budgeted.
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            BudgetStatus::Under
        } else {
            BudgetStatus::Over
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    pub month: NaiveDate,
    pub amount: f64,
    /// Present once the window has a full history.
    pub moving_average: Option<f64>,
    /// Moving average minus budget, or amount minus budget without a window.
    pub delta: Option<f64>,
    pub status: Option<BudgetStatus>,
}

/// Totals of every transaction per month over the resolved range, zero-filled.
///
/// With a `budget`, each month carries a delta and an under/over status,
/// measured on the moving average when a window is given.
pub fn monthly_totals<T: TransactionRecord>(
    transactions: &[T],
    budget: Option<f64>,
    moving_average_window: Option<usize>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<MonthlyTotal>> {
    let Some(range) = resolve_date_range(
        start_date,
        end_date,
        transactions.iter().map(|t| t.date()),
        moving_average_window,
    )?
    else {
        return Ok(Vec::new());
    };

    let mut sums: BTreeMap<NaiveDate, f64> = range.months.iter().map(|m| (*m, 0.0)).collect();
    for t in transactions {
        if let Some(sum) = sums.get_mut(&first_day_of_month(t.date())) {
            *sum += t.amount();
        }
    }

    let amounts: Vec<f64> = sums.values().copied().collect();
    let averages = moving_average_window.map(|w| rolling_mean(&amounts, w));

    debug!(
        "Monthly totals over {} months (window {:?}, budget {:?})",
        amounts.len(),
        moving_average_window,
        budget
    );

    Ok(sums
        .into_iter()
        .enumerate()
        .map(|(i, (month, amount))| {
            let moving_average = averages
                .as_ref()
                .map(|a| a[i])
                .filter(|v| !v.is_nan());
            let compared = match moving_average_window {
                Some(_) => moving_average,
                None => Some(amount),
            };
            let delta = budget.and_then(|b| compared.map(|v| v - b));
            MonthlyTotal {
                month,
                amount,
                moving_average,
                delta,
                status: delta.map(BudgetStatus::from_delta),
            }
        })
        .collect())
}

/// For every month with activity, the running total by day of month.
///
/// Days without transactions are omitted; the running total carries over.
pub fn burn_rate<T: TransactionRecord>(transactions: &[T]) -> BTreeMap<NaiveDate, Vec<(u32, f64)>> {
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for t in transactions {
        *daily.entry(t.date()).or_insert(0.0) += t.amount();
    }

    let mut by_month: BTreeMap<NaiveDate, Vec<(u32, f64)>> = BTreeMap::new();
    for (day, amount) in daily {
        let points = by_month.entry(first_day_of_month(day)).or_default();
        let running = points.last().map_or(0.0, |(_, total)| *total);
        points.push((day.day(), running + amount));
    }
    by_month
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn transactions() -> Vec<Transaction> {
        vec![
            Transaction::on_date(ymd(2023, 1, 3), -40.0, "Groceries"),
            Transaction::on_date(ymd(2023, 1, 3), -10.0, "Coffee"),
            Transaction::on_date(ymd(2023, 1, 20), -50.0, "Groceries"),
            Transaction::on_date(ymd(2023, 3, 2), -30.0, "Groceries"),
        ]
    }

    #[test]
    fn test_monthly_totals_fill_gaps() {
        let totals = monthly_totals(&transactions(), Some(-80.0), None, None, None).unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[1].month, ymd(2023, 2, 1));
        assert_eq!(totals[1].amount, 0.0);
        assert_eq!(totals[1].status, Some(BudgetStatus::Under));

        assert!((totals[0].amount - (-100.0)).abs() < 1e-9);
        assert_eq!(totals[0].status, Some(BudgetStatus::Over));
    }

    #[test]
    fn test_monthly_totals_moving_average() {
        let totals = monthly_totals(&transactions(), Some(-50.0), Some(2), None, None).unwrap();
        // Padded with December.
        assert_eq!(totals.len(), 4);
        assert_eq!(totals[0].moving_average, None);
        assert_eq!(totals[0].delta, None);

        let jan = &totals[1];
        assert!((jan.moving_average.unwrap() - (-50.0)).abs() < 1e-9);
        let feb = &totals[2];
        assert!((feb.moving_average.unwrap() - (-50.0)).abs() < 1e-9);
        let mar = &totals[3];
        assert!((mar.moving_average.unwrap() - (-15.0)).abs() < 1e-9);
        assert_eq!(mar.status, Some(BudgetStatus::Under));
    }

    #[test]
    fn test_burn_rate() {
        let burn = burn_rate(&transactions());
        let jan = &burn[&ymd(2023, 1, 1)];
        assert_eq!(jan, &vec![(3, -50.0), (20, -100.0)]);
        assert_eq!(burn[&ymd(2023, 3, 1)], vec![(2, -30.0)]);
        assert!(!burn.contains_key(&ymd(2023, 2, 1)));
    }
}
