//! # Budget Delta Builder
//!
//! A library for comparing categorized transactions against a hierarchical
//! budget, producing dense monthly budget-versus-actual series.
//!
//! ## Core Concepts
//!
//! - **Budget**: a monthly target amount covering one or more categories
//! - **BudgetCollection**: a named tree of budgets and nested collections
//! - **Aggregation**: transactions are mapped to budgets by category, summed
//!   per month, zero-filled over every (budget, month) pair and compared to the
//!   budget amount
//! - **Subtotal**: a synthetic row summing every budget's delta per month
//!
//! ## Example
//!
//! ```rust,ignore
//! use budget_delta_builder::*;
//! use chrono::NaiveDate;
//!
//! let mut car = BudgetCollection::new("Car");
//! car.add_budget(Budget::new(-100.0, ["Gas & Fuel"]), true)?;
//! car.add_budget(Budget::new(-15.0, ["Parking"]), true)?;
//!
//! let mut expenses = BudgetCollection::new("Expenses");
//! expenses.add_budget(car, true)?;
//! expenses.add_budget(Budget::named(-875.0, ["Groceries"], "Groceries"), true)?;
//!
//! let transactions = vec![
//!     Transaction::on_date(NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(), -64.20, "Gas & Fuel"),
//!     Transaction::on_date(NaiveDate::from_ymd_opt(2023, 3, 9).unwrap(), -212.75, "Groceries"),
//! ];
//!
//! let processor = BudgetDeltaProcessor::new(expenses);
//! let table = processor.process(
//!     &transactions,
//!     &["Car", "Groceries"],
//!     &AggregationOptions { moving_average_window: Some(3), ..Default::default() },
//! )?;
//! println!("{}", table.to_csv()?);
//! ```

pub mod budget;
pub mod collection;
pub mod definition;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod report;
pub mod scale;
pub mod transaction;
pub mod trend;
pub mod utils;

pub use budget::{AmountType, Budget};
pub use collection::{
    AggregationDepth, BudgetCollection, BudgetNode, DEFAULT_BUDGET_COLLECTION_NAME,
};
pub use definition::BudgetDefinition;
pub use engine::{
    aggregate_to_budget_deltas, AggregationOptions, BudgetTarget, DeltaRow, DeltaTable,
    SUBTOTAL_NAME,
};
pub use error::{BudgetError, Result};
pub use ingestion::{
    read_transactions, read_transactions_from_path, CsvColumnMap, CsvImportOptions, SignColumn,
};
pub use report::SummaryOptions;
pub use scale::{ceil_to, floor_to, get_rounded_z_range_including_mid, make_centered_rg_colorscale};
pub use transaction::{InMemoryTransactionStore, Transaction, TransactionRecord, TransactionStore};
pub use trend::{burn_rate, monthly_totals, BudgetStatus, MonthlyTotal};
pub use utils::*;

use log::{debug, info};
use std::sync::Arc;

/// Shares one budget tree across any number of aggregation requests.
///
/// The tree is never mutated after construction, so a processor can be cloned
/// into request handlers and used from several threads at once.
#[derive(Debug, Clone)]
pub struct BudgetDeltaProcessor {
    collection: Arc<BudgetCollection>,
}

impl BudgetDeltaProcessor {
    pub fn new(collection: BudgetCollection) -> Self {
        Self {
            collection: Arc::new(collection),
        }
    }

    pub fn from_definition(definition: &BudgetDefinition) -> Result<Self> {
        Ok(Self::new(definition.build_collection()?))
    }

    pub fn collection(&self) -> &BudgetCollection {
        &self.collection
    }

    /// Slices the tree down to `selected` (names at any depth) and aggregates
    /// `transactions` against the slice.
    pub fn process<T, S>(
        &self,
        transactions: &[T],
        selected: &[S],
        options: &AggregationOptions,
    ) -> Result<DeltaTable>
    where
        T: TransactionRecord,
        S: AsRef<str>,
    {
        info!(
            "Processing {} transactions against {} of '{}'",
            transactions.len(),
            selected.len(),
            self.collection.name()
        );

        let subset = self.collection.slice_by_budgets(selected)?;
        if subset.is_empty() {
            debug!("No budgets selected; returning an empty table");
            return Ok(DeltaTable::empty());
        }

        aggregate_to_budget_deltas(transactions, BudgetTarget::Collection(&subset), options)
    }

    /// Like [`BudgetDeltaProcessor::process`], pulling transactions from a
    /// store.
    pub fn process_store<St, S>(
        &self,
        store: &St,
        selected: &[S],
        options: &AggregationOptions,
    ) -> Result<DeltaTable>
    where
        St: TransactionStore,
        S: AsRef<str>,
    {
        self.process(&store.all_transactions(), selected, options)
    }

    /// Aggregates against the whole tree's direct children.
    pub fn process_all<T: TransactionRecord>(
        &self,
        transactions: &[T],
        options: &AggregationOptions,
    ) -> Result<DeltaTable> {
        aggregate_to_budget_deltas(transactions, BudgetTarget::Collection(&self.collection), options)
    }

    /// Categories seen in `categories` that the tree does not cover.
    pub fn unbudgeted_categories<S: AsRef<str>>(&self, categories: &[S]) -> Vec<String> {
        self.collection.unbudgeted_categories(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn processor() -> BudgetDeltaProcessor {
        let mut car = BudgetCollection::new("Car");
        car.add_budget(Budget::new(-100.0, ["Gas & Fuel"]), true).unwrap();
        car.add_budget(Budget::new(-15.0, ["Parking"]), true).unwrap();

        let mut expenses = BudgetCollection::new("Expenses");
        expenses.add_budget(car, true).unwrap();
        expenses
            .add_budget(Budget::named(-875.0, ["Groceries"], "Groceries"), true)
            .unwrap();
        BudgetDeltaProcessor::new(expenses)
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_process_selected_budgets() {
        let transactions = vec![
            Transaction::on_date(ymd(2023, 1, 5), -60.0, "Gas & Fuel"),
            Transaction::on_date(ymd(2023, 1, 9), -10.0, "Parking"),
            Transaction::on_date(ymd(2023, 2, 9), -900.0, "Groceries"),
        ];

        let table = processor()
            .process(&transactions, &["Car"], &AggregationOptions::default())
            .unwrap();

        assert_eq!(table.budget_names(), &["Car".to_string()]);
        assert_eq!(table.months().len(), 2);
        let jan = table.get("Car", ymd(2023, 1, 1)).unwrap();
        assert!((jan.amount - (-70.0)).abs() < 1e-9);
        assert!((jan.delta - 45.0).abs() < 1e-9);
        let feb = table.get("Car", ymd(2023, 2, 1)).unwrap();
        assert!((feb.delta - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_process_nothing_selected() {
        let transactions = vec![Transaction::on_date(ymd(2023, 1, 5), -60.0, "Gas & Fuel")];
        let table = processor()
            .process::<_, &str>(&transactions, &[], &AggregationOptions::default())
            .unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_process_unknown_budget() {
        let transactions: Vec<Transaction> = Vec::new();
        let err = processor()
            .process(&transactions, &["Boats"], &AggregationOptions::default())
            .unwrap_err();
        assert!(matches!(err, BudgetError::BudgetNotFound(_)));
    }

    #[test]
    fn test_shared_across_threads() {
        let processor = processor();
        let transactions = vec![Transaction::on_date(ymd(2023, 1, 5), -60.0, "Gas & Fuel")];

        let tables: Vec<DeltaTable> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let processor = processor.clone();
                    let transactions = &transactions;
                    scope.spawn(move || {
                        processor
                            .process_all(transactions, &AggregationOptions::default())
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(tables.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_unbudgeted_categories() {
        let unbudgeted = processor().unbudgeted_categories(&["Parking", "Pets", "Groceries"]);
        assert_eq!(unbudgeted, vec!["Pets"]);
    }
}
