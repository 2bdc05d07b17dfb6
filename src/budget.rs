use crate::error::{BudgetError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Appended to the default name of a single-category budget so the budget
/// name never equals the category it covers.
pub const SINGLE_CATEGORY_NAME_SUFFIX: &str = " (budget)";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum AmountType {
    #[schemars(description = "The amount is spent or earned every month")]
    #[default]
    Monthly,

    #[schemars(description = "The amount is spent or earned once per year and is divided by 12 internally")]
    Yearly,
}

impl AmountType {
    pub fn to_monthly(self, amount: f64) -> f64 {
        match self {
            AmountType::Monthly => amount,
            AmountType::Yearly => amount / 12.0,
        }
    }
}

impl FromStr for AmountType {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Monthly" => Ok(AmountType::Monthly),
            "Yearly" => Ok(AmountType::Yearly),
            other => Err(BudgetError::InvalidAmountType(other.to_string())),
        }
    }
}

/// A single monthly budget target covering one or more categories.
///
/// Amounts are signed: expenses are negative and income positive. The stored
/// amount is always normalized to a monthly value.
#[derive(Debug, Clone, Serialize)]
pub struct Budget {
    amount: f64,
    categories: Vec<String>,
    name: String,
    #[serde(skip)]
    category_to_budget: BTreeMap<String, String>,
}

impl Budget {
    /// Monthly budget named after its categories.
    pub fn new<I, S>(amount: f64, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_amount_type(amount, categories, None, AmountType::Monthly)
    }

    pub fn named<I, S>(amount: f64, categories: I, name: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_amount_type(amount, categories, Some(name.into()), AmountType::Monthly)
    }

    pub fn with_amount_type<I, S>(
        amount: f64,
        categories: I,
        name: Option<String>,
        amount_type: AmountType,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let categories: Vec<String> = categories.into_iter().map(Into::into).collect();
        let name = name.unwrap_or_else(|| default_budget_name(&categories));
        let category_to_budget = categories
            .iter()
            .map(|c| (c.clone(), name.clone()))
            .collect();

        Self {
            amount: amount_type.to_monthly(amount),
            categories,
            name,
            category_to_budget,
        }
    }

    /// Same as [`Budget::with_amount_type`] but takes the amount type as free
    /// text, failing on anything other than `Monthly` or `Yearly`.
    pub fn try_new<I, S>(
        amount: f64,
        categories: I,
        name: Option<String>,
        amount_type: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let amount_type = amount_type.parse::<AmountType>()?;
        Ok(Self::with_amount_type(amount, categories, name, amount_type))
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category_to_budget(&self) -> &BTreeMap<String, String> {
        &self.category_to_budget
    }

    pub fn covers(&self, category: &str) -> bool {
        self.category_to_budget.contains_key(category)
    }

    /// Maps each category to this budget's name, or `None` when it is not
    /// covered. The output is aligned with the input.
    pub fn aggregate_categories_to_budget<S: AsRef<str>>(
        &self,
        categories: &[S],
    ) -> Vec<Option<String>> {
        categories
            .iter()
            .map(|c| self.category_to_budget.get(c.as_ref()).cloned())
            .collect()
    }

    pub fn to_summary_line(&self, amount: bool, categories: bool) -> String {
        let mut line = format!("{:30}", self.name);
        if amount {
            line.push_str(&format!(" | ${:>8.2}", self.amount));
        }
        if categories {
            line.push_str(&format!(" | {:?}", self.categories));
        }
        line
    }
}

impl PartialEq for Budget {
    fn eq(&self, other: &Self) -> bool {
        self.categories == other.categories && self.amount == other.amount && self.name == other.name
    }
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_summary_line(true, true))
    }
}

fn default_budget_name(categories: &[String]) -> String {
    let joined = categories.join(", ");
    if categories.len() == 1 {
        format!("{}{}", joined, SINGLE_CATEGORY_NAME_SUFFIX)
    } else {
        joined
    }
}
