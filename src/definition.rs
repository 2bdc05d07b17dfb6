use crate::budget::{AmountType, Budget};
use crate::collection::{BudgetCollection, BudgetNode};
use crate::error::{BudgetError, Result};
use log::info;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarative budget tree, loaded from JSON and built into a
/// [`BudgetCollection`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetDefinition {
    #[schemars(description = "A single budget target covering one or more transaction categories")]
    Budget {
        #[schemars(
            description = "Unique name of the budget. Defaults to the comma-joined category names."
        )]
        #[serde(default)]
        name: Option<String>,

        #[schemars(
            description = "Signed target amount. Expenses are negative, income positive."
        )]
        amount: f64,

        #[schemars(description = "Whether the amount is per month or per year")]
        #[serde(default)]
        amount_type: AmountType,

        #[schemars(description = "Transaction categories counted against this budget")]
        categories: Vec<String>,
    },

    #[schemars(description = "A named group of budgets and nested collections")]
    Collection {
        #[schemars(description = "Name of the group, unique within its parent")]
        name: String,

        #[schemars(description = "Children in display order")]
        #[serde(default)]
        budgets: Vec<BudgetDefinition>,
    },
}

impl BudgetDefinition {
    pub fn name(&self) -> Option<&str> {
        match self {
            BudgetDefinition::Budget { name, .. } => name.as_deref(),
            BudgetDefinition::Collection { name, .. } => Some(name),
        }
    }

    /// Builds the node, rejecting duplicate names and categories.
    pub fn build(&self) -> Result<BudgetNode> {
        match self {
            BudgetDefinition::Budget {
                name,
                amount,
                amount_type,
                categories,
            } => {
                if categories.is_empty() {
                    return Err(BudgetError::InvalidDefinition(format!(
                        "Budget '{}' has no categories",
                        name.as_deref().unwrap_or("<unnamed>")
                    )));
                }
                Ok(BudgetNode::Leaf(Budget::with_amount_type(
                    *amount,
                    categories.iter().cloned(),
                    name.clone(),
                    *amount_type,
                )))
            }
            BudgetDefinition::Collection { name, budgets } => {
                let mut collection = BudgetCollection::new(name.clone());
                for child in budgets {
                    collection.add_budget(child.build()?, true)?;
                }
                Ok(BudgetNode::Group(collection))
            }
        }
    }

    /// Builds a definition whose root must be a collection.
    pub fn build_collection(&self) -> Result<BudgetCollection> {
        match self.build()? {
            BudgetNode::Group(collection) => {
                info!(
                    "Built budget collection '{}' with {} leaf budgets",
                    collection.name(),
                    collection.get_leaf_budgets().len()
                );
                Ok(collection)
            }
            BudgetNode::Leaf(b) => Err(BudgetError::InvalidDefinition(format!(
                "Root of a budget definition must be a collection, found budget '{}'",
                b.name()
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(BudgetDefinition)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

impl From<&Budget> for BudgetDefinition {
    fn from(b: &Budget) -> Self {
        BudgetDefinition::Budget {
            name: Some(b.name().to_string()),
            amount: b.amount(),
            amount_type: AmountType::Monthly,
            categories: b.categories().to_vec(),
        }
    }
}

impl From<&BudgetCollection> for BudgetDefinition {
    fn from(bc: &BudgetCollection) -> Self {
        BudgetDefinition::Collection {
            name: bc.name().to_string(),
            budgets: bc
                .get_budgets()
                .iter()
                .map(|node| match node {
                    BudgetNode::Leaf(b) => BudgetDefinition::from(b),
                    BudgetNode::Group(inner) => BudgetDefinition::from(inner),
                })
                .collect(),
        }
    }
}
