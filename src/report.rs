use crate::collection::{BudgetCollection, BudgetNode};
use crate::engine::DeltaTable;
use crate::error::{BudgetError, Result};
use std::fmt;

/// Which parts of a budget tree summary to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryOptions {
    pub amount: bool,
    pub categories: bool,
    pub total: bool,
    pub header: bool,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            amount: true,
            categories: true,
            total: true,
            header: true,
        }
    }
}

impl BudgetCollection {
    /// One line per leaf budget; nested collections are printed inline
    /// without their own header or total.
    pub fn to_summary_string(&self, options: SummaryOptions) -> String {
        let mut output = String::new();
        if options.header {
            output.push_str(&format!("{}\n", self.name()));
        }

        let nested = SummaryOptions {
            total: false,
            header: false,
            ..options
        };
        for (i, b) in self.get_budgets().iter().enumerate() {
            if i > 0 {
                output.push('\n');
            }
            match b {
                BudgetNode::Leaf(leaf) => {
                    output.push_str(&leaf.to_summary_line(options.amount, options.categories))
                }
                BudgetNode::Group(group) => output.push_str(&group.to_summary_string(nested)),
            }
        }

        if options.total {
            output.push_str(&format!("\n{}", "-".repeat(30)));
            output.push_str(&format!("\n{:30} | ${:>8.2}", "Total", self.amount()));
        }
        output
    }

    /// Nested outline of the tree, one bullet per node.
    pub fn to_markdown(&self) -> String {
        let mut output = format!("# {}\n\n", self.name());
        self.push_markdown_items(&mut output, 0);
        output.push_str(&format!("\n**Total:** ${:.2}\n", self.amount()));
        output
    }

    fn push_markdown_items(&self, output: &mut String, level: usize) {
        let indent = "  ".repeat(level);
        for b in self.get_budgets() {
            match b {
                BudgetNode::Leaf(leaf) => output.push_str(&format!(
                    "{}- {} (${:.2}): {}\n",
                    indent,
                    leaf.name(),
                    leaf.amount(),
                    leaf.categories().join(", ")
                )),
                BudgetNode::Group(group) => {
                    output.push_str(&format!(
                        "{}- **{}** (${:.2})\n",
                        indent,
                        group.name(),
                        group.amount()
                    ));
                    group.push_markdown_items(output, level + 1);
                }
            }
        }
    }
}

impl fmt::Display for BudgetCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_summary_string(SummaryOptions::default()))
    }
}

impl DeltaTable {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self.rows())?)
    }

    /// Rows as CSV; incomplete moving-average cells are left blank.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record(["budget_name", "month", "amount", "budget", "delta"])?;

        for row in self.rows() {
            writer.write_record([
                row.budget_name.clone(),
                row.month.format("%Y-%m-%d").to_string(),
                csv_number(row.amount),
                format!("{:.2}", row.budget),
                csv_number(row.delta),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| BudgetError::IoError(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn csv_number(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        format!("{:.2}", value)
    }
}
