use crate::budget::Budget;
use crate::error::{BudgetError, Result};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

pub const DEFAULT_BUDGET_COLLECTION_NAME: &str = "Unnamed Budget";

/// Granularity used when mapping categories onto a budget tree.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AggregationDepth {
    /// Every covered category maps to the collection itself.
    This,
    /// Every covered category maps to the direct child that covers it.
    Child,
    /// Every covered category maps to the leaf budget that covers it.
    #[default]
    Leaf,
}

impl FromStr for AggregationDepth {
    type Err = BudgetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "this" => Ok(AggregationDepth::This),
            "child" => Ok(AggregationDepth::Child),
            "leaf" => Ok(AggregationDepth::Leaf),
            other => Err(BudgetError::InvalidDefinition(format!(
                "Unknown aggregation depth '{}'. Expected this, child or leaf",
                other
            ))),
        }
    }
}

/// A node of the budget tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetNode {
    Leaf(Budget),
    Group(BudgetCollection),
}

impl BudgetNode {
    pub fn name(&self) -> &str {
        match self {
            BudgetNode::Leaf(b) => b.name(),
            BudgetNode::Group(bc) => bc.name(),
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            BudgetNode::Leaf(b) => b.amount(),
            BudgetNode::Group(bc) => bc.amount(),
        }
    }

    pub fn categories(&self) -> Vec<String> {
        match self {
            BudgetNode::Leaf(b) => b.categories().to_vec(),
            BudgetNode::Group(bc) => bc.categories(),
        }
    }

    pub fn category_to_budget(&self) -> BTreeMap<String, String> {
        match self {
            BudgetNode::Leaf(b) => b.category_to_budget().clone(),
            BudgetNode::Group(bc) => bc.category_to_budget(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, BudgetNode::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&Budget> {
        match self {
            BudgetNode::Leaf(b) => Some(b),
            BudgetNode::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&BudgetCollection> {
        match self {
            BudgetNode::Leaf(_) => None,
            BudgetNode::Group(bc) => Some(bc),
        }
    }

    /// Leaves ignore `depth`.
    pub fn aggregate_categories_to_budget<S: AsRef<str>>(
        &self,
        categories: &[S],
        depth: AggregationDepth,
    ) -> Vec<Option<String>> {
        match self {
            BudgetNode::Leaf(b) => b.aggregate_categories_to_budget(categories),
            BudgetNode::Group(bc) => bc.aggregate_categories_to_budget(categories, depth),
        }
    }
}

impl From<Budget> for BudgetNode {
    fn from(b: Budget) -> Self {
        BudgetNode::Leaf(b)
    }
}

impl From<BudgetCollection> for BudgetNode {
    fn from(bc: BudgetCollection) -> Self {
        BudgetNode::Group(bc)
    }
}

/// A named, ordered group of budgets and nested collections.
///
/// Collections are built once and then only queried. Every query returns new
/// values; slicing and flattening never touch the original tree.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetCollection {
    name: String,
    budgets: Vec<BudgetNode>,
    #[serde(skip)]
    name_check_depth: Option<usize>,
}

impl Default for BudgetCollection {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET_COLLECTION_NAME)
    }
}

impl PartialEq for BudgetCollection {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.budgets == other.budgets
    }
}

impl BudgetCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            budgets: Vec::new(),
            name_check_depth: None,
        }
    }

    /// Limits how deep `add_budget` looks for clashing descendant names.
    /// `None` searches the whole subtree.
    pub fn with_name_check_depth(mut self, depth: Option<usize>) -> Self {
        self.name_check_depth = depth;
        self
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sum of every descendant leaf amount.
    pub fn amount(&self) -> f64 {
        self.budgets.iter().map(BudgetNode::amount).sum()
    }

    /// All leaf categories in tree order.
    pub fn categories(&self) -> Vec<String> {
        self.budgets.iter().flat_map(|b| b.categories()).collect()
    }

    /// Every collection name in the subtree mapped to its direct children's
    /// names.
    pub fn categories_flat_dict(&self) -> BTreeMap<String, Vec<String>> {
        let mut flat = BTreeMap::new();
        self.collect_flat_dict(&mut flat);
        flat
    }

    fn collect_flat_dict(&self, flat: &mut BTreeMap<String, Vec<String>>) {
        flat.insert(
            self.name.clone(),
            self.budgets.iter().map(|b| b.name().to_string()).collect(),
        );
        for b in &self.budgets {
            if let BudgetNode::Group(bc) = b {
                bc.collect_flat_dict(flat);
            }
        }
    }

    /// Every category in the subtree mapped to this collection's name.
    pub fn category_to_budget(&self) -> BTreeMap<String, String> {
        self.categories()
            .into_iter()
            .map(|c| (c, self.name.clone()))
            .collect()
    }

    /// Names of descendant nodes, pre-order. `depth` counts levels below this
    /// collection; `Some(1)` returns only the direct children.
    pub fn budget_names(&self, depth: Option<usize>) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names(depth, &mut names);
        names
    }

    fn collect_names(&self, depth: Option<usize>, names: &mut Vec<String>) {
        if depth == Some(0) {
            return;
        }
        let deeper = depth.map(|d| d - 1);
        for b in &self.budgets {
            names.push(b.name().to_string());
            if let BudgetNode::Group(bc) = b {
                bc.collect_names(deeper, names);
            }
        }
    }

    /// Appends `b` as the last child.
    ///
    /// With `raise_on_duplicate`, the call fails without modifying the tree if
    /// any category of `b` or its name is already used in this collection as a
    /// category, a descendant name, or the collection's own name.
    pub fn add_budget(&mut self, b: impl Into<BudgetNode>, raise_on_duplicate: bool) -> Result<()> {
        let b = b.into();
        if raise_on_duplicate {
            self.check_duplicates(&b)?;
        }
        debug!("Adding budget '{}' to collection '{}'", b.name(), self.name);
        self.budgets.push(b);
        Ok(())
    }

    fn check_duplicates(&self, b: &BudgetNode) -> Result<()> {
        let mut known: HashSet<String> = self.categories().into_iter().collect();
        known.extend(self.budget_names(self.name_check_depth));
        known.insert(self.name.clone());

        let candidates = b.categories().into_iter().chain(std::iter::once(b.name().to_string()));
        for candidate in candidates {
            if known.contains(&candidate) {
                return Err(BudgetError::DuplicateName {
                    budget: b.name().to_string(),
                    name: candidate,
                });
            }
        }
        Ok(())
    }

    /// Adds every direct child of `other`. Either all children are added or,
    /// on a duplicate, none are.
    pub fn extend(&mut self, other: &BudgetCollection) -> Result<()> {
        let mut staged = self.clone();
        for b in other.get_budgets() {
            staged.add_budget(b.clone(), true)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn get_budgets(&self) -> &[BudgetNode] {
        &self.budgets
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    /// Depth-first, pre-order search by name. Under name collisions the first
    /// node found wins.
    pub fn get_budget_by_name(&self, name: &str, recurse: bool) -> Result<&BudgetNode> {
        self.find_by_name(name, recurse)
            .ok_or_else(|| BudgetError::BudgetNotFound(name.to_string()))
    }

    fn find_by_name(&self, name: &str, recurse: bool) -> Option<&BudgetNode> {
        for b in &self.budgets {
            if b.name() == name {
                return Some(b);
            }
            if recurse {
                if let BudgetNode::Group(bc) = b {
                    if let Some(found) = bc.find_by_name(name, recurse) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    pub fn get_leaf_budgets(&self) -> Vec<&Budget> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, leaves: &mut Vec<&'a Budget>) {
        for b in &self.budgets {
            match b {
                BudgetNode::Leaf(leaf) => leaves.push(leaf),
                BudgetNode::Group(bc) => bc.collect_leaves(leaves),
            }
        }
    }

    /// New collection with the same name holding the named nodes, found at any
    /// depth, in the order given. Repeated names fail the duplicate check.
    pub fn slice_by_budgets<S: AsRef<str>>(&self, names: &[S]) -> Result<BudgetCollection> {
        let mut sliced = BudgetCollection::new(self.name.clone())
            .with_name_check_depth(self.name_check_depth);
        for name in names {
            let node = self.get_budget_by_name(name.as_ref(), true)?;
            sliced.add_budget(node.clone(), true)?;
        }
        Ok(sliced)
    }

    /// New collection with the same name whose direct children are this
    /// collection's leaves.
    pub fn flatten(&self) -> BudgetCollection {
        BudgetCollection {
            name: self.name.clone(),
            budgets: self
                .get_leaf_budgets()
                .into_iter()
                .cloned()
                .map(BudgetNode::Leaf)
                .collect(),
            name_check_depth: self.name_check_depth,
        }
    }

    /// Maps each category to the name of the node covering it at `depth`, or
    /// `None` when nothing in this collection covers it. The output is aligned
    /// with the input.
    pub fn aggregate_categories_to_budget<S: AsRef<str>>(
        &self,
        categories: &[S],
        depth: AggregationDepth,
    ) -> Vec<Option<String>> {
        let lookup = self.category_lookup(depth);
        categories
            .iter()
            .map(|c| lookup.get(c.as_ref()).cloned())
            .collect()
    }

    pub(crate) fn category_lookup(&self, depth: AggregationDepth) -> BTreeMap<String, String> {
        match depth {
            AggregationDepth::This => self.category_to_budget(),
            AggregationDepth::Child => {
                let mut lookup = BTreeMap::new();
                for b in &self.budgets {
                    lookup.extend(b.category_to_budget());
                }
                lookup
            }
            AggregationDepth::Leaf => {
                let mut lookup = BTreeMap::new();
                for leaf in self.get_leaf_budgets() {
                    lookup.extend(
                        leaf.category_to_budget()
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone())),
                    );
                }
                lookup
            }
        }
    }

    /// Categories from `categories` that no budget in this tree covers.
    pub fn unbudgeted_categories<S: AsRef<str>>(&self, categories: &[S]) -> Vec<String> {
        let budgeted: HashSet<String> = self.categories().into_iter().collect();
        categories
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| !budgeted.contains(*c))
            .map(str::to_string)
            .collect()
    }
}
