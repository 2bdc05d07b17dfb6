use thiserror::Error;

#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("Invalid value for amount_type ('{0}'): must be Monthly or Yearly")]
    InvalidAmountType(String),

    #[error("Budget '{budget}' has name or category '{name}' that is already in this BudgetCollection")]
    DuplicateName { budget: String, name: String },

    #[error("No budget named '{0}'")]
    BudgetNotFound(String),

    #[error("Budget name '{0}' is reserved and cannot be used")]
    ReservedName(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid moving average window {0}: must be at least 1")]
    InvalidWindow(usize),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Invalid budget definition: {0}")]
    InvalidDefinition(String),

    #[error("Import error on line {line}: {details}")]
    ImportError { line: u64, details: String },

    #[error("Delta table verification failed for {month}: {details}")]
    VerificationError { month: String, details: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BudgetError>;
