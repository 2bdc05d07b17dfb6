use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The minimum a record must expose to be aggregated against a budget.
pub trait TransactionRecord {
    fn timestamp(&self) -> NaiveDateTime;

    /// Signed amount; expenses are negative.
    fn amount(&self) -> f64;

    fn category(&self) -> Option<&str>;

    fn date(&self) -> NaiveDate {
        self.timestamp().date()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Option<i64>,
    pub datetime: NaiveDateTime,
    pub description: String,
    pub amount: f64,
    pub account_name: Option<String>,
    pub source_file: Option<String>,
    pub category: Option<String>,
}

impl Transaction {
    pub fn new(datetime: NaiveDateTime, amount: f64, category: Option<&str>) -> Self {
        Self {
            id: None,
            datetime,
            description: String::new(),
            amount,
            account_name: None,
            source_file: None,
            category: category.map(str::to_string),
        }
    }

    pub fn on_date(date: NaiveDate, amount: f64, category: &str) -> Self {
        Self::new(date.and_time(chrono::NaiveTime::MIN), amount, Some(category))
    }
}

impl TransactionRecord for Transaction {
    fn timestamp(&self) -> NaiveDateTime {
        self.datetime
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

/// Read access to stored transactions.
pub trait TransactionStore {
    type Record: TransactionRecord + Clone;

    fn all_transactions(&self) -> Vec<Self::Record>;

    fn transactions_with_category(&self, category: &str) -> Vec<Self::Record> {
        self.all_transactions()
            .into_iter()
            .filter(|t| t.category() == Some(category))
            .collect()
    }

    /// Transactions dated within `[start, end]`, both inclusive.
    fn transactions_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<Self::Record> {
        self.all_transactions()
            .into_iter()
            .filter(|t| {
                let d = t.date();
                d >= start && d <= end
            })
            .collect()
    }

    fn transaction_categories(&self) -> BTreeSet<String> {
        self.all_transactions()
            .iter()
            .filter_map(|t| t.category().map(str::to_string))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionStore {
    transactions: Vec<Transaction>,
}

impl InMemoryTransactionStore {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn add(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for InMemoryTransactionStore {
    type Record = Transaction;

    fn all_transactions(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> InMemoryTransactionStore {
        let mut uncategorized = Transaction::on_date(ymd(2023, 2, 2), -3.0, "x");
        uncategorized.category = None;
        InMemoryTransactionStore::new(vec![
            Transaction::on_date(ymd(2023, 1, 5), -20.0, "Groceries"),
            Transaction::on_date(ymd(2023, 1, 31), -4.5, "Coffee Shops"),
            Transaction::on_date(ymd(2023, 3, 1), -18.0, "Groceries"),
            uncategorized,
        ])
    }

    #[test]
    fn test_filters() {
        let store = store();
        assert_eq!(store.len(), 4);
        assert_eq!(store.transactions_with_category("Groceries").len(), 2);
        assert_eq!(
            store.transactions_between(ymd(2023, 1, 31), ymd(2023, 2, 28)).len(),
            2
        );
    }

    #[test]
    fn test_transaction_categories() {
        let categories: Vec<String> = store().transaction_categories().into_iter().collect();
        assert_eq!(categories, vec!["Coffee Shops", "Groceries"]);
    }
}
