//! Output formatting for describe command results.

use super::execute::DescribeResult;
use crate::db::{FieldFormat, Oid};
use crate::output::{render_grid, Outputable};

fn type_label(type_oid: Oid, type_name: Option<&str>) -> String {
    match type_name {
        Some(name) => name.to_string(),
        None => format!("oid {}", type_oid),
    }
}

impl Outputable for DescribeResult {
    fn to_table(&self) -> String {
        let statement = if self.statement.is_empty() {
            "(unnamed)"
        } else {
            self.statement.as_str()
        };
        let mut sections = vec![format!("Statement: {}", statement)];

        if self.params.is_empty() {
            sections.push("Parameters: none".to_string());
        } else {
            let headers = ["param".to_string(), "type".to_string()];
            let rows: Vec<Vec<String>> = self
                .params
                .iter()
                .map(|p| vec![format!("${}", p.position), type_label(p.type_oid, p.type_name)])
                .collect();
            sections.push(format!("Parameters:\n{}", render_grid(&headers, &rows)));
        }

        if self.columns.is_empty() {
            sections.push("Columns: none".to_string());
        } else {
            let headers = ["column".to_string(), "type".to_string(), "format".to_string()];
            let rows: Vec<Vec<String>> = self
                .columns
                .iter()
                .map(|c| {
                    let format = match c.format {
                        FieldFormat::Text => "text",
                        FieldFormat::Binary => "binary",
                    };
                    vec![
                        c.name.clone(),
                        type_label(c.type_oid, c.type_name),
                        format.to_string(),
                    ]
                })
                .collect();
            sections.push(format!("Columns:\n{}", render_grid(&headers, &rows)));
        }

        sections.join("\n\n")
    }
}
