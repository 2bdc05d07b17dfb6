use crate::collection::{AggregationDepth, BudgetCollection};
use crate::error::{BudgetError, Result};
use crate::scale::{get_rounded_z_range_including_mid, make_centered_rg_colorscale};
use crate::transaction::TransactionRecord;
use crate::utils::{first_day_of_month, resolve_date_range, rolling_mean, DateRange};
use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name of the synthetic row summing every real budget's delta per month.
pub const SUBTOTAL_NAME: &str = "Subtotal";

/// What the actual spend is compared against.
#[derive(Debug, Clone, Copy)]
pub enum BudgetTarget<'a> {
    /// One amount applied to every category, each category its own row.
    Flat(f64),
    /// Categories are grouped by the collection's nodes at the requested depth.
    Collection(&'a BudgetCollection),
    /// Per-category amounts. Not supported.
    PerCategory(&'a BTreeMap<String, f64>),
}

impl<'a> From<&'a BudgetCollection> for BudgetTarget<'a> {
    fn from(bc: &'a BudgetCollection) -> Self {
        BudgetTarget::Collection(bc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AggregationOptions {
    #[schemars(description = "First day to show. Rounded down to the start of its month. Defaults to the earliest transaction.")]
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[schemars(description = "Last day to show. Rounded up to the end of its month. Defaults to the latest transaction.")]
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    #[schemars(description = "Trailing moving-average window in months. Must be at least 1.")]
    #[serde(default)]
    pub moving_average_window: Option<usize>,

    #[schemars(description = "Which level of the budget tree each row represents.")]
    #[serde(default = "default_depth")]
    pub depth: AggregationDepth,
}

fn default_depth() -> AggregationDepth {
    AggregationDepth::Child
}

impl Default for AggregationOptions {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            moving_average_window: None,
            depth: default_depth(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaRow {
    pub budget_name: String,
    /// First day of the month.
    pub month: NaiveDate,
    /// Summed actual amount, or its moving average when a window is set.
    pub amount: f64,
    pub budget: f64,
    pub delta: f64,
}

/// Dense (budget, month) table of actual, budget and delta values.
///
/// Rows are grouped by budget in budget order, months ascending within each
/// budget, followed by the `Subtotal` rows. Cells without a full moving-average
/// window hold `NaN`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeltaTable {
    budget_names: Vec<String>,
    months: Vec<NaiveDate>,
    visible_start: Option<NaiveDate>,
    visible_end: Option<NaiveDate>,
    rows: Vec<DeltaRow>,
}

impl DeltaTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[DeltaRow] {
        &self.rows
    }

    /// Real budget names, without `Subtotal`.
    pub fn budget_names(&self) -> &[String] {
        &self.budget_names
    }

    /// Every month in the table, including moving-average padding.
    pub fn months(&self) -> &[NaiveDate] {
        &self.months
    }

    pub fn visible_start(&self) -> Option<NaiveDate> {
        self.visible_start
    }

    pub fn visible_end(&self) -> Option<NaiveDate> {
        self.visible_end
    }

    pub fn get(&self, budget_name: &str, month: NaiveDate) -> Option<&DeltaRow> {
        self.rows
            .iter()
            .find(|r| r.budget_name == budget_name && r.month == month)
    }

    pub fn rows_for(&self, budget_name: &str) -> impl Iterator<Item = &DeltaRow> {
        let name = budget_name.to_string();
        self.rows.iter().filter(move |r| r.budget_name == name)
    }

    /// Rows inside the requested range, without padding months.
    pub fn visible_rows(&self) -> impl Iterator<Item = &DeltaRow> {
        let start = self.visible_start;
        self.rows
            .iter()
            .filter(move |r| start.map_or(true, |s| r.month >= s))
    }

    pub fn deltas(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.delta).collect()
    }

    pub fn z_range(&self, zmid: f64, round_to: Option<f64>) -> (f64, f64) {
        get_rounded_z_range_including_mid(self.deltas(), zmid, round_to)
    }

    pub fn colorscale(&self, zmid: f64, round_to: Option<f64>) -> Vec<(f64, &'static str)> {
        let (zmin, zmax) = self.z_range(zmid, round_to);
        make_centered_rg_colorscale(zmin, zmax, zmid, false)
    }

    /// Checks that every (budget, month) cell is present exactly once and that
    /// each `Subtotal` delta equals the sum of that month's real deltas.
    pub fn verify(&self, tolerance: f64) -> Result<()> {
        let expected = (self.budget_names.len() + 1) * self.months.len();
        if !self.is_empty() && self.rows.len() != expected {
            return Err(BudgetError::VerificationError {
                month: "all".to_string(),
                details: format!("expected {} rows, found {}", expected, self.rows.len()),
            });
        }

        for month in &self.months {
            let real: Vec<f64> = self
                .budget_names
                .iter()
                .map(|name| {
                    self.get(name, *month)
                        .map(|r| r.delta)
                        .ok_or_else(|| BudgetError::VerificationError {
                            month: month.to_string(),
                            details: format!("missing row for '{}'", name),
                        })
                })
                .collect::<Result<_>>()?;

            let subtotal = self.get(SUBTOTAL_NAME, *month).ok_or_else(|| {
                BudgetError::VerificationError {
                    month: month.to_string(),
                    details: "missing Subtotal row".to_string(),
                }
            })?;

            let expected = nan_skipping_sum(real);
            let both_nan = expected.is_nan() && subtotal.delta.is_nan();
            if !both_nan && !((subtotal.delta - expected).abs() <= tolerance) {
                return Err(BudgetError::VerificationError {
                    month: month.to_string(),
                    details: format!(
                        "Subtotal delta {} does not match summed deltas {}",
                        subtotal.delta, expected
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Sum of the finite values, or `NaN` if there are none.
fn nan_skipping_sum<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut finite = values.into_iter().filter(|v| !v.is_nan()).peekable();
    if finite.peek().is_none() {
        return f64::NAN;
    }
    finite.sum()
}

/// Row labels, their budget amounts and the category lookup for a target.
struct BudgetLayout {
    names: Vec<String>,
    amounts: Vec<f64>,
    lookup: CategoryLookup,
}

enum CategoryLookup {
    Map(BTreeMap<String, String>),
    Identity,
}

impl CategoryLookup {
    fn resolve(&self, category: &str) -> Option<String> {
        match self {
            CategoryLookup::Map(map) => map.get(category).cloned(),
            CategoryLookup::Identity => Some(category.to_string()),
        }
    }
}

fn budget_layout<T: TransactionRecord>(
    transactions: &[T],
    budget: BudgetTarget<'_>,
    depth: AggregationDepth,
) -> Result<BudgetLayout> {
    match budget {
        BudgetTarget::Collection(bc) => {
            let (names, amounts) = match depth {
                AggregationDepth::This => (vec![bc.name().to_string()], vec![bc.amount()]),
                AggregationDepth::Child => bc
                    .get_budgets()
                    .iter()
                    .map(|b| (b.name().to_string(), b.amount()))
                    .unzip(),
                AggregationDepth::Leaf => bc
                    .get_leaf_budgets()
                    .iter()
                    .map(|b| (b.name().to_string(), b.amount()))
                    .unzip(),
            };
            Ok(BudgetLayout {
                names,
                amounts,
                lookup: CategoryLookup::Map(bc.category_lookup(depth)),
            })
        }
        BudgetTarget::Flat(amount) => {
            let mut names: Vec<String> = Vec::new();
            for category in transactions.iter().filter_map(|t| t.category()) {
                if !names.iter().any(|n| n == category) {
                    names.push(category.to_string());
                }
            }
            let amounts = vec![amount; names.len()];
            Ok(BudgetLayout {
                names,
                amounts,
                lookup: CategoryLookup::Identity,
            })
        }
        BudgetTarget::PerCategory(_) => Err(BudgetError::NotImplemented(
            "per-category budget mappings are not supported; pass a flat amount or a BudgetCollection"
                .to_string(),
        )),
    }
}

/// Aggregates transactions into a dense per-budget, per-month delta table.
///
/// Transactions whose category is not covered by `budget` are dropped. When
/// nothing is left the result is an empty table. A budget named `Subtotal`
/// is rejected regardless of the transactions.
pub fn aggregate_to_budget_deltas<T: TransactionRecord>(
    transactions: &[T],
    budget: BudgetTarget<'_>,
    options: &AggregationOptions,
) -> Result<DeltaTable> {
    let layout = budget_layout(transactions, budget, options.depth)?;
    if layout.names.iter().any(|n| n == SUBTOTAL_NAME) {
        return Err(BudgetError::ReservedName(SUBTOTAL_NAME.to_string()));
    }

    let range = match resolve_date_range(
        options.start_date,
        options.end_date,
        transactions.iter().map(|t| t.date()),
        options.moving_average_window,
    )? {
        Some(range) => range,
        None => {
            debug!("No transactions and no explicit date range; nothing to aggregate");
            return Ok(DeltaTable::empty());
        }
    };

    debug!(
        "Aggregating {} transactions over {} months ({} to {}, padded from {})",
        transactions.len(),
        range.months.len(),
        range.start,
        range.end,
        range.padded_start
    );

    let index: HashMap<&str, usize> = layout
        .names
        .iter()
        .enumerate()
        .rev()
        .map(|(i, n)| (n.as_str(), i))
        .collect();

    let mut mapped = 0usize;
    let mut sums: HashMap<(usize, NaiveDate), f64> = HashMap::new();
    for t in transactions {
        let Some(budget_name) = t.category().and_then(|c| layout.lookup.resolve(c)) else {
            continue;
        };
        let Some(&i) = index.get(budget_name.as_str()) else {
            continue;
        };
        mapped += 1;

        let month = first_day_of_month(t.date());
        if range.contains_month(month) {
            *sums.entry((i, month)).or_insert(0.0) += t.amount();
        }
    }

    if mapped == 0 {
        debug!(
            "None of the {} transactions map to the {} selected budgets",
            transactions.len(),
            layout.names.len()
        );
        return Ok(DeltaTable::empty());
    }
    debug!("Dropped {} unbudgeted transactions", transactions.len() - mapped);

    let rows = dense_rows(&layout, &range, &sums, options.moving_average_window);

    info!(
        "Built delta table with {} budgets over {} months",
        layout.names.len(),
        range.months.len()
    );

    Ok(DeltaTable {
        budget_names: layout.names,
        months: range.months,
        visible_start: Some(range.start),
        visible_end: Some(range.end),
        rows,
    })
}

fn dense_rows(
    layout: &BudgetLayout,
    range: &DateRange,
    sums: &HashMap<(usize, NaiveDate), f64>,
    moving_average_window: Option<usize>,
) -> Vec<DeltaRow> {
    let mut rows = Vec::with_capacity((layout.names.len() + 1) * range.months.len());
    let mut subtotals: Vec<Vec<DeltaRow>> = vec![Vec::new(); range.months.len()];

    for (i, (name, budget)) in layout.names.iter().zip(&layout.amounts).enumerate() {
        let actuals: Vec<f64> = range
            .months
            .iter()
            .map(|m| sums.get(&(i, *m)).copied().unwrap_or(0.0))
            .collect();

        // Each budget's series is averaged on its own.
        let actuals = match moving_average_window {
            Some(window) => rolling_mean(&actuals, window),
            None => actuals,
        };

        for (m, (month, amount)) in range.months.iter().zip(actuals).enumerate() {
            let row = DeltaRow {
                budget_name: name.clone(),
                month: *month,
                amount,
                budget: *budget,
                delta: amount - budget,
            };
            subtotals[m].push(row.clone());
            rows.push(row);
        }
    }

    for (month, month_rows) in range.months.iter().zip(subtotals) {
        rows.push(DeltaRow {
            budget_name: SUBTOTAL_NAME.to_string(),
            month: *month,
            amount: nan_skipping_sum(month_rows.iter().map(|r| r.amount)),
            budget: month_rows.iter().map(|r| r.budget).sum(),
            delta: nan_skipping_sum(month_rows.iter().map(|r| r.delta)),
        });
    }

    rows
}
