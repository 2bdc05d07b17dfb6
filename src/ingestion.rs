use crate::error::{BudgetError, Result};
use crate::transaction::Transaction;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%b-%Y"];
const TIME_FORMATS: [&str; 4] = ["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Header names of the columns read from a transaction CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvColumnMap {
    /// Date or date and time. Combined with `time` when that is set.
    pub datetime: String,
    /// Separate time-of-day column.
    #[serde(default)]
    pub time: Option<String>,
    pub description: String,
    pub amount: String,
    #[serde(default)]
    pub sign: Option<SignColumn>,
    /// Optional columns are skipped when absent from the file.
    pub account_name: Option<String>,
    pub category: Option<String>,
}

impl Default for CsvColumnMap {
    fn default() -> Self {
        Self {
            datetime: "Datetime".to_string(),
            time: None,
            description: "Description".to_string(),
            amount: "Amount".to_string(),
            sign: None,
            account_name: Some("Account Name".to_string()),
            category: Some("Category".to_string()),
        }
    }
}

/// Column that carries an amount's direction, for exports where every
/// amount is positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignColumn {
    pub column: String,
    /// Rows whose value equals this, ignoring case, are negated.
    pub negate_value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvImportOptions {
    pub columns: CsvColumnMap,
    /// Flip every amount's sign, for exports that record charges as positive.
    #[serde(default)]
    pub negate_amounts: bool,
    /// Used when the file has no account column.
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub source_file: Option<String>,
}

impl CsvImportOptions {
    /// Mint export: positive amounts signed by a `Transaction Type` of
    /// `debit` or `credit`.
    pub fn mint() -> Self {
        Self {
            columns: CsvColumnMap {
                datetime: "Date".to_string(),
                sign: Some(SignColumn {
                    column: "Transaction Type".to_string(),
                    negate_value: "debit".to_string(),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// PC Financial Mastercard export: separate `Date` and `Time` columns,
    /// charges positive and payments negative.
    pub fn pc_mastercard() -> Self {
        Self {
            columns: CsvColumnMap {
                datetime: "Date".to_string(),
                time: Some("Time".to_string()),
                account_name: None,
                category: None,
                ..Default::default()
            },
            negate_amounts: true,
            account_name: Some("PC Financial".to_string()),
            source_file: None,
        }
    }
}

/// Reads normalized transactions from CSV with a header row.
pub fn read_transactions<R: Read>(reader: R, options: &CsvImportOptions) -> Result<Vec<Transaction>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: HashMap<String, usize> = csv_reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_string(), i))
        .collect();

    let required = |name: &str| {
        headers.get(name).copied().ok_or_else(|| BudgetError::ImportError {
            line: 1,
            details: format!("missing column '{}'", name),
        })
    };
    let datetime_idx = required(&options.columns.datetime)?;
    let description_idx = required(&options.columns.description)?;
    let amount_idx = required(&options.columns.amount)?;
    let time_idx = options.columns.time.as_deref().map(|c| required(c)).transpose()?;
    let sign = options
        .columns
        .sign
        .as_ref()
        .map(|s| required(&s.column).map(|idx| (idx, s.negate_value.as_str())))
        .transpose()?;
    let account_idx = options
        .columns
        .account_name
        .as_ref()
        .and_then(|c| headers.get(c).copied());
    let category_idx = options
        .columns
        .category
        .as_ref()
        .and_then(|c| headers.get(c).copied());

    let mut transactions = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let field = |idx: usize| record.get(idx).unwrap_or("");

        let mut datetime = parse_datetime(field(datetime_idx)).ok_or_else(|| BudgetError::ImportError {
            line,
            details: format!("unrecognized date '{}'", field(datetime_idx)),
        })?;
        if let Some(idx) = time_idx {
            let time = parse_time(field(idx)).ok_or_else(|| BudgetError::ImportError {
                line,
                details: format!("unrecognized time '{}'", field(idx)),
            })?;
            datetime = datetime.date().and_time(time);
        }

        let raw_amount = field(amount_idx).replace([',', '$'], "");
        let amount: f64 = raw_amount.parse().map_err(|_| BudgetError::ImportError {
            line,
            details: format!("invalid amount '{}'", field(amount_idx)),
        })?;

        let signed_negative = sign.is_some_and(|(idx, value)| field(idx).eq_ignore_ascii_case(value));
        let negate = options.negate_amounts != signed_negative;

        let optional = |idx: Option<usize>| {
            idx.map(field)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        transactions.push(Transaction {
            id: None,
            datetime,
            description: field(description_idx).to_string(),
            amount: if negate { -amount } else { amount },
            account_name: optional(account_idx).or_else(|| options.account_name.clone()),
            source_file: options.source_file.clone(),
            category: optional(category_idx),
        });
    }

    debug!("Parsed {} transactions from CSV", transactions.len());
    Ok(transactions)
}

pub fn read_transactions_from_path(
    path: impl AsRef<Path>,
    options: &CsvImportOptions,
) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)?;
    let mut options = options.clone();
    if options.source_file.is_none() {
        options.source_file = Some(path.display().to_string());
    }
    let transactions = read_transactions(file, &options)?;
    info!("Imported {} transactions from {}", transactions.len(), path.display());
    Ok(transactions)
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(value, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(value, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    TIME_FORMATS
        .iter()
        .find_map(|f| NaiveTime::parse_from_str(value, f).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Datetime,Description,Amount,Account Name,Category
2023-01-05,SUPERSTORE #12,\"-1,020.50\",Chequing,Groceries
2023-01-06 14:30:00,COFFEE CO,-4.25,Chequing,
01/31/2023,PAYROLL,2500,Chequing,Paycheck
";

    #[test]
    fn test_read_transactions() {
        let transactions = read_transactions(CSV.as_bytes(), &CsvImportOptions::default()).unwrap();
        assert_eq!(transactions.len(), 3);

        assert!((transactions[0].amount - (-1020.50)).abs() < 1e-9);
        assert_eq!(transactions[0].category.as_deref(), Some("Groceries"));
        assert_eq!(transactions[0].account_name.as_deref(), Some("Chequing"));

        assert_eq!(transactions[1].category, None);
        assert_eq!(
            transactions[1].datetime,
            NaiveDate::from_ymd_opt(2023, 1, 6)
                .unwrap()
                .and_hms_opt(14, 30, 0)
                .unwrap()
        );

        assert_eq!(
            transactions[2].datetime.date(),
            NaiveDate::from_ymd_opt(2023, 1, 31).unwrap()
        );
    }

    #[test]
    fn test_negate_amounts_and_custom_columns() {
        let csv = "Date,Memo,Charge\n2023-02-01,GAS STATION,45.10\n";
        let options = CsvImportOptions {
            columns: CsvColumnMap {
                datetime: "Date".to_string(),
                description: "Memo".to_string(),
                amount: "Charge".to_string(),
                account_name: None,
                category: None,
                ..Default::default()
            },
            negate_amounts: true,
            account_name: Some("PC Financial".to_string()),
            source_file: None,
        };
        let transactions = read_transactions(csv.as_bytes(), &options).unwrap();
        assert!((transactions[0].amount - (-45.10)).abs() < 1e-9);
        assert_eq!(transactions[0].account_name.as_deref(), Some("PC Financial"));
    }

    #[test]
    fn test_bad_rows_report_line() {
        let csv = "Datetime,Description,Amount\n2023-02-01,OK,1.00\nnot a date,BAD,2.00\n";
        let err = read_transactions(csv.as_bytes(), &CsvImportOptions::default()).unwrap_err();
        assert!(matches!(err, BudgetError::ImportError { line: 3, .. }));

        let missing = "Date,Description,Amount\n";
        let err = read_transactions(missing.as_bytes(), &CsvImportOptions::default()).unwrap_err();
        assert!(matches!(err, BudgetError::ImportError { line: 1, .. }));
    }

    #[test]
    fn test_mint_export_signs_from_transaction_type() {
        let csv = "\
Date,Description,Original Description,Amount,Transaction Type,Category,Account Name,Labels,Notes
1/05/2023,Superstore,SUPERSTORE #12,212.75,debit,Groceries,Visa,,
1/06/2023,Payroll,ACME PAYROLL,2500.00,credit,Paycheck,Chequing,,
1/07/2023,Refund,SHOE STORE,40.00,Debit,Clothing,Visa,,
";
        let transactions = read_transactions(csv.as_bytes(), &CsvImportOptions::mint()).unwrap();
        assert_eq!(transactions.len(), 3);

        assert!((transactions[0].amount - (-212.75)).abs() < 1e-9);
        assert_eq!(transactions[0].category.as_deref(), Some("Groceries"));
        assert_eq!(
            transactions[0].datetime.date(),
            NaiveDate::from_ymd_opt(2023, 1, 5).unwrap()
        );
        assert!((transactions[1].amount - 2500.0).abs() < 1e-9);
        assert!((transactions[2].amount - (-40.0)).abs() < 1e-9);

        let missing = "Date,Description,Amount\n1/05/2023,X,1.00\n";
        let err = read_transactions(missing.as_bytes(), &CsvImportOptions::mint()).unwrap_err();
        assert!(matches!(err, BudgetError::ImportError { line: 1, .. }));
    }

    #[test]
    fn test_pc_mastercard_export_joins_date_and_time() {
        let csv = "\
Description,Type,Card Holder Name,Date,Time,Amount
SHELL C01234,PURCHASE,J DOE,02/14/2023,6:05 PM,48.10
PAYMENT,PAYMENT,J DOE,02/20/2023,09:15:00,-300.00
";
        let transactions =
            read_transactions(csv.as_bytes(), &CsvImportOptions::pc_mastercard()).unwrap();
        assert_eq!(transactions.len(), 2);

        assert_eq!(
            transactions[0].datetime,
            NaiveDate::from_ymd_opt(2023, 2, 14)
                .unwrap()
                .and_hms_opt(18, 5, 0)
                .unwrap()
        );
        assert!((transactions[0].amount - (-48.10)).abs() < 1e-9);
        assert_eq!(transactions[0].account_name.as_deref(), Some("PC Financial"));
        assert_eq!(transactions[0].category, None);

        assert_eq!(
            transactions[1].datetime,
            NaiveDate::from_ymd_opt(2023, 2, 20)
                .unwrap()
                .and_hms_opt(9, 15, 0)
                .unwrap()
        );
        assert!((transactions[1].amount - 300.0).abs() < 1e-9);

        let bad_time = "Description,Date,Time,Amount\nX,02/14/2023,late,1.00\n";
        let err = read_transactions(bad_time.as_bytes(), &CsvImportOptions::pc_mastercard())
            .unwrap_err();
        assert!(matches!(err, BudgetError::ImportError { line: 2, .. }));
    }
}
