//! Output formatting for exec command results.

use super::execute::{ExecResult, ResultRows};
use crate::output::{cell_text, render_grid, value_text, Outputable};

impl Outputable for ExecResult {
    fn to_table(&self) -> String {
        if self.columns.is_empty() {
            return self.status.to_string();
        }

        let rows: Vec<Vec<String>> = match &self.rows {
            ResultRows::Raw(raw) => raw
                .positional
                .iter()
                .map(|row| row.iter().map(cell_text).collect())
                .collect(),
            ResultRows::Decoded(rows) => rows
                .iter()
                .map(|row| row.iter().map(value_text).collect())
                .collect(),
        };

        render_grid(&self.columns, &rows)
    }
}
